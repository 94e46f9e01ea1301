use core::fmt;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp = 0x01,
        Tcp  = 0x06,
        Udp  = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// The Internet checksum of RFC 1071.
///
/// All functions return the folded one's complement sum *without* the final complement so that
/// partial sums over disjoint parts can be merged with [`combine`].
pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::Protocol;
    use crate::wire::Ipv4Address;

    /// Fold all carries above the low 16 bits back in until none remain.
    fn propagate_carries(mut word: u32) -> u16 {
        while word > 0xffff {
            word = (word >> 16) + (word & 0xffff);
        }
        word as u16
    }

    /// Sum a byte sequence as big-endian 16-bit words.
    ///
    /// An odd trailing octet is summed as if padded with one zero octet.
    pub fn data(mut data: &[u8]) -> u16 {
        let mut accum: u32 = 0;

        // Summing in chunks keeps the accumulator far from overflow.
        const CHUNK_SIZE: usize = 32;
        while data.len() >= CHUNK_SIZE {
            let mut d = &data[..CHUNK_SIZE];
            while d.len() >= 2 {
                accum += u32::from(NetworkEndian::read_u16(d));
                d = &d[2..];
            }
            accum = u32::from(propagate_carries(accum));
            data = &data[CHUNK_SIZE..];
        }

        while data.len() >= 2 {
            accum += u32::from(NetworkEndian::read_u16(data));
            data = &data[2..];
        }

        if let Some(&value) = data.first() {
            accum += u32::from(value) << 8;
        }

        propagate_carries(accum)
    }

    /// Combine several partial checksums.
    pub fn combine(checksums: &[u16]) -> u16 {
        let accum = checksums
            .iter()
            .map(|&word| u32::from(word))
            .sum();
        propagate_carries(accum)
    }

    /// Sum the 12-octet IPv4 pseudo header.
    ///
    /// Source address, destination address, a zero octet, the protocol and the big-endian length
    /// of the transport segment (header and payload).
    pub fn pseudo_header(
        src_addr: Ipv4Address,
        dst_addr: Ipv4Address,
        protocol: Protocol,
        length: u16,
    ) -> u16 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol.into();
        NetworkEndian::write_u16(&mut proto_len[2..4], length);

        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..]),
        ])
    }
}
