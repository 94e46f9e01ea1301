use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::checksum;
use super::field::Field;

pub(crate) use super::IpProtocol as Protocol;

/// Length of a header without options, the only kind this stack emits.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

/// Time to live of every emitted datagram.
pub const DEFAULT_TTL: u8 = 64;

/// Bit of the flags field requesting that routers never fragment the datagram.
pub const FLAG_DONT_FRAGMENT: u8 = 0b010;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<std::net::Ipv4Addr> for Address {
    fn from(x: std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

impl From<Address> for std::net::Ipv4Addr {
    fn from(Address(x): Address) -> std::net::Ipv4Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 header.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const TOS:      usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 header structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 header structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::TooShort)` if the buffer is shorter than the fixed header or than the
    /// header length field claims. Returns `Err(Error::Malformed)` for a header length below the
    /// fixed header.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < HEADER_LEN {
            Err(Error::TooShort)
        } else if usize::from(self.header_len()) < HEADER_LEN {
            Err(Error::Malformed)
        } else if len < usize::from(self.header_len()) {
            Err(Error::TooShort)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length field, in 32-bit words.
    #[inline]
    pub fn ihl(&self) -> u8 {
        self.0[field::VER_IHL] & 0x0f
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        self.ihl() * 4
    }

    /// Return the type of service field.
    #[inline]
    pub fn tos(&self) -> u8 {
        self.0[field::TOS]
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    /// Return the three flag bits.
    #[inline]
    pub fn flags(&self) -> u8 {
        (NetworkEndian::read_u16(&self.0[field::FLG_OFF]) >> 13) as u8
    }

    /// Return the fragment offset field, in units of 8 octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x1fff
    }

    /// Return the time to live field.
    #[inline]
    pub fn ttl(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Validate the header checksum.
    ///
    /// The sum over the whole header, checksum field included, folds to all ones exactly when
    /// the checksum is correct.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0[..usize::from(self.header_len())]) == !0
    }

    /// Set the version and header length (in words) fields.
    #[inline]
    pub fn set_version_ihl(&mut self, version: u8, ihl: u8) {
        self.0[field::VER_IHL] = (version << 4) | (ihl & 0x0f);
    }

    /// Set the type of service field.
    #[inline]
    pub fn set_tos(&mut self, value: u8) {
        self.0[field::TOS] = value
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Set the flag bits and the fragment offset.
    #[inline]
    pub fn set_flags_frag_offset(&mut self, flags: u8, offset: u16) {
        let raw = (u16::from(flags & 0b111) << 13) | (offset & 0x1fff);
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_ttl(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = !checksum::data(&self.0[..usize::from(self.header_len())]);
        self.set_checksum(checksum)
    }

    /// The range of the datagram payload, as far as the buffer holds it.
    pub fn payload_range(&self) -> Field {
        usize::from(self.header_len())..self.0.len()
    }
}

impl AsRef<[u8]> for ipv4 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A high-level representation of an IPv4 header.
///
/// Parsed freshly from every inbound frame and built freshly for every reply, never cached.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    /// The version nibble, 4 for every header this stack emits.
    pub version: u8,
    /// Header length in 32-bit words.
    pub ihl: u8,
    /// Type of service.
    pub tos: u8,
    /// Length of the datagram including this header.
    pub total_len: u16,
    /// Identification.
    pub ident: u16,
    /// The three flag bits, see [`FLAG_DONT_FRAGMENT`].
    pub flags: u8,
    /// Fragment offset in units of 8 octets.
    pub frag_offset: u16,
    /// Time to live.
    pub ttl: u8,
    /// Protocol of the payload.
    pub protocol: Protocol,
    /// The checksum as found on the wire, zero on built headers.
    pub checksum: u16,
    /// Source address.
    pub src_addr: Address,
    /// Destination address.
    pub dst_addr: Address,
}

impl Header {
    /// Build the header of a reply datagram carrying `payload_len` octets of TCP.
    ///
    /// Version 4 without options, TTL 64, don't fragment, identification 0. The checksum is left
    /// zero and only computed by [`emit`](#method.emit).
    pub fn new(src_addr: Address, dst_addr: Address, payload_len: usize) -> Self {
        Header {
            version: 4,
            ihl: (HEADER_LEN / 4) as u8,
            tos: 0,
            total_len: (HEADER_LEN + payload_len) as u16,
            ident: 0,
            flags: FLAG_DONT_FRAGMENT,
            frag_offset: 0,
            ttl: DEFAULT_TTL,
            protocol: Protocol::Tcp,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse the header at the start of a buffer.
    ///
    /// The version is not checked here, leaving that decision to the caller.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let packet = ipv4::new_checked(buffer)?;
        Ok(Header {
            version: packet.version(),
            ihl: packet.ihl(),
            tos: packet.tos(),
            total_len: packet.total_len(),
            ident: packet.ident(),
            flags: packet.flags(),
            frag_offset: packet.frag_offset(),
            ttl: packet.ttl(),
            protocol: packet.protocol(),
            checksum: packet.checksum(),
            src_addr: packet.src_addr(),
            dst_addr: packet.dst_addr(),
        })
    }

    /// The header length in octets.
    pub fn header_len(&self) -> usize {
        usize::from(self.ihl) * 4
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit the header into the first [`HEADER_LEN`] octets of a buffer.
    ///
    /// Options are never emitted so the header length field is forced to five words. The
    /// checksum is computed over the emitted octets and written into its field.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than [`HEADER_LEN`].
    pub fn emit(&self, buffer: &mut [u8]) {
        let packet = ipv4::new_unchecked_mut(&mut buffer[..HEADER_LEN]);
        packet.set_version_ihl(self.version, (HEADER_LEN / 4) as u8);
        packet.set_tos(self.tos);
        packet.set_total_len(self.total_len);
        packet.set_ident(self.ident);
        packet.set_flags_frag_offset(self.flags, self.frag_offset);
        packet.set_ttl(self.ttl);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
        packet.fill_checksum();
    }

    /// Serialize into the canonical 20-octet layout with a valid checksum.
    pub fn marshal(&self) -> Vec<u8> {
        let mut bytes = vec![0; HEADER_LEN];
        self.emit(&mut bytes);
        bytes
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} len={} ttl={}",
               self.src_addr, self.dst_addr, self.protocol, self.total_len, self.ttl)
    }
}
