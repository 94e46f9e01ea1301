use core::{fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::checksum;
use super::{IpProtocol, Ipv4Address, Ipv4Header};

/// Length of a header without options, the only kind this stack emits.
pub const HEADER_LEN: usize = field::URGENT.end;

/// The receive window advertised in every emitted segment.
pub const DEFAULT_WINDOW: u16 = 65535;

/// A TCP sequence number.
///
/// A sequence number is an integer modulo 2<sup>32</sup>, all arithmetic wraps.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub u32);

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ops::Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl ops::AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

/// The set of tcp control flags.
///
/// Independent booleans, converted to the flag octet only when reading or writing a header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct Flags {
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

byte_wrapper! {
    /// A byte sequence representing a TCP segment.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const OFF_RSV:  usize = 12;
    pub(crate) const FLAGS:    usize = 13;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u8 = 0x01;
    pub(crate) const FLG_SYN: u8 = 0x02;
    pub(crate) const FLG_RST: u8 = 0x04;
    pub(crate) const FLG_PSH: u8 = 0x08;
    pub(crate) const FLG_ACK: u8 = 0x10;
    pub(crate) const FLG_URG: u8 = 0x20;
    pub(crate) const FLG_ECE: u8 = 0x40;
    pub(crate) const FLG_CWR: u8 = 0x80;
}

impl Flags {
    /// No flag set.
    pub const NONE: Flags = Flags {
        cwr: false, ece: false, urg: false, ack: false,
        psh: false, rst: false, syn: false, fin: false,
    };

    /// A bare acknowledgment.
    pub const ACK: Flags = Flags { ack: true, ..Flags::NONE };

    /// The second step of the three-way handshake.
    pub const SYN_ACK: Flags = Flags { syn: true, ack: true, ..Flags::NONE };

    /// A segment carrying data to deliver immediately.
    pub const PSH_ACK: Flags = Flags { psh: true, ack: true, ..Flags::NONE };

    /// Closing our direction of the connection.
    pub const FIN_ACK: Flags = Flags { fin: true, ack: true, ..Flags::NONE };

    /// Decode the flag octet, bit 0 is FIN and bit 7 is CWR.
    pub fn from_octet(octet: u8) -> Self {
        Flags {
            cwr: octet & field::FLG_CWR != 0,
            ece: octet & field::FLG_ECE != 0,
            urg: octet & field::FLG_URG != 0,
            ack: octet & field::FLG_ACK != 0,
            psh: octet & field::FLG_PSH != 0,
            rst: octet & field::FLG_RST != 0,
            syn: octet & field::FLG_SYN != 0,
            fin: octet & field::FLG_FIN != 0,
        }
    }

    /// Encode into the flag octet.
    pub fn to_octet(self) -> u8 {
        let bit = |set: bool, flag: u8| if set { flag } else { 0 };
        bit(self.cwr, field::FLG_CWR)
            | bit(self.ece, field::FLG_ECE)
            | bit(self.urg, field::FLG_URG)
            | bit(self.ack, field::FLG_ACK)
            | bit(self.psh, field::FLG_PSH)
            | bit(self.rst, field::FLG_RST)
            | bit(self.syn, field::FLG_SYN)
            | bit(self.fin, field::FLG_FIN)
    }

    /// If the flags consume one unit of sequence space.
    pub fn sequence_len(self) -> u32 {
        u32::from(self.syn || self.fin)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.cwr, "CWR"), (self.ece, "ECE"), (self.urg, "URG"), (self.ack, "ACK"),
            (self.psh, "PSH"), (self.rst, "RST"), (self.syn, "SYN"), (self.fin, "FIN"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

impl tcp {
    /// Imbue a raw octet buffer with TCP segment structure.
    pub fn new_unchecked(buffer: &[u8]) -> &tcp {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with TCP segment structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut tcp {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&tcp> {
        let segment = Self::new_unchecked(data);
        segment.check_len()?;
        Ok(segment)
    }

    /// View the segment as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::TooShort)` if the buffer cannot hold the fixed header or the header
    /// length indicated by the data offset, `Err(Error::Malformed)` for a data offset that points
    /// into the fixed header.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < HEADER_LEN {
            Err(Error::TooShort)
        } else if self.header_len() < HEADER_LEN {
            Err(Error::Malformed)
        } else if len < self.header_len() {
            Err(Error::TooShort)
        } else {
            Ok(())
        }
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::ACK_NUM]))
    }

    /// Return the data offset field, in 32-bit words.
    #[inline]
    pub fn data_offset(&self) -> u8 {
        self.0[field::OFF_RSV] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> usize {
        usize::from(self.data_offset()) * 4
    }

    /// Return the reserved bits, the low nibble next to the data offset.
    #[inline]
    pub fn reserved(&self) -> u8 {
        self.0[field::OFF_RSV] & 0x0f
    }

    /// Return the decoded control flags.
    #[inline]
    pub fn flags(&self) -> Flags {
        Flags::from_octet(self.0[field::FLAGS])
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// Return the payload following the header.
    pub fn payload_slice(&self) -> &[u8] {
        &self.0[self.header_len()..]
    }

    /// Validate the checksum of the whole segment against the pseudo header of its datagram.
    pub fn verify_checksum(&self, src_addr: Ipv4Address, dst_addr: Ipv4Address) -> bool {
        checksum::combine(&[
            checksum::pseudo_header(src_addr, dst_addr, IpProtocol::Tcp, self.0.len() as u16),
            checksum::data(&self.0),
        ]) == !0
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::ACK_NUM], value.0)
    }

    /// Set the data offset (in words) and the reserved bits.
    #[inline]
    pub fn set_data_offset_reserved(&mut self, offset: u8, reserved: u8) {
        self.0[field::OFF_RSV] = (offset << 4) | (reserved & 0x0f)
    }

    /// Set the control flags.
    #[inline]
    pub fn set_flags(&mut self, flags: Flags) {
        self.0[field::FLAGS] = flags.to_octet()
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill in the checksum over the pseudo header and the whole buffer.
    pub fn fill_checksum(&mut self, src_addr: Ipv4Address, dst_addr: Ipv4Address) {
        self.set_checksum(0);
        let checksum = !checksum::combine(&[
            checksum::pseudo_header(src_addr, dst_addr, IpProtocol::Tcp, self.0.len() as u16),
            checksum::data(&self.0),
        ]);
        self.set_checksum(checksum)
    }
}

impl AsRef<[u8]> for tcp {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A high-level representation of a TCP header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// Sequence number of the first octet of this segment.
    pub seq_number: SeqNumber,
    /// Next sequence number the sender expects to receive.
    pub ack_number: SeqNumber,
    /// Header length in 32-bit words.
    pub data_offset: u8,
    /// The reserved bits following the data offset.
    pub reserved: u8,
    /// Control flags.
    pub flags: Flags,
    /// Advertised receive window.
    pub window_len: u16,
    /// The checksum as found on the wire, zero on built headers.
    pub checksum: u16,
    /// Urgent pointer.
    pub urgent_at: u16,
}

impl Header {
    /// Build a header without options advertising the full window.
    ///
    /// The checksum is only computed when emitted.
    pub fn new(
        src_port: u16,
        dst_port: u16,
        seq_number: SeqNumber,
        ack_number: SeqNumber,
        flags: Flags,
    ) -> Self {
        Header {
            src_port,
            dst_port,
            seq_number,
            ack_number,
            data_offset: (HEADER_LEN / 4) as u8,
            reserved: 0,
            flags,
            window_len: DEFAULT_WINDOW,
            checksum: 0,
            urgent_at: 0,
        }
    }

    /// Parse the header at the start of a segment.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let segment = tcp::new_checked(buffer)?;
        Ok(Header {
            src_port: segment.src_port(),
            dst_port: segment.dst_port(),
            seq_number: segment.seq_number(),
            ack_number: segment.ack_number(),
            data_offset: segment.data_offset(),
            reserved: segment.reserved(),
            flags: segment.flags(),
            window_len: segment.window_len(),
            checksum: segment.checksum(),
            urgent_at: segment.urgent_at(),
        })
    }

    /// The header length in octets.
    pub fn header_len(&self) -> usize {
        usize::from(self.data_offset) * 4
    }

    /// Return the length of the header that will be emitted.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit the header into a buffer holding the header followed by the payload.
    ///
    /// The payload must already be in place. Options are never emitted, the data offset is forced
    /// to five words. The checksum covers the pseudo header of `ip` and the whole buffer.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than [`HEADER_LEN`].
    pub fn emit(&self, buffer: &mut [u8], ip: &Ipv4Header) {
        let segment = tcp::new_unchecked_mut(buffer);
        segment.set_src_port(self.src_port);
        segment.set_dst_port(self.dst_port);
        segment.set_seq_number(self.seq_number);
        segment.set_ack_number(self.ack_number);
        segment.set_data_offset_reserved((HEADER_LEN / 4) as u8, self.reserved);
        segment.set_flags(self.flags);
        segment.set_window_len(self.window_len);
        segment.set_urgent_at(self.urgent_at);
        segment.fill_checksum(ip.src_addr, ip.dst_addr);
    }

    /// Serialize header and payload with the checksum for the pseudo header of `ip`.
    pub fn marshal(&self, ip: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0; HEADER_LEN + payload.len()];
        bytes[HEADER_LEN..].copy_from_slice(payload);
        self.emit(&mut bytes, ip);
        bytes
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} seq={} ack={} flags={} win={}",
               self.src_port, self.dst_port, self.seq_number, self.ack_number,
               self.flags, self.window_len)
    }
}
