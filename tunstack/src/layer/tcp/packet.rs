use crate::layer::ip;
use crate::nic::Frame;
use crate::wire::{Error, IpProtocol, Ipv4Header, Result, TcpHeader};

use super::PortPair;

/// A received segment with both its headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// The header of the enclosing datagram.
    pub ip: Ipv4Header,
    /// The header of the segment.
    pub tcp: TcpHeader,
    /// The complete frame, both headers included.
    pub frame: Frame,
}

impl Packet {
    /// Parse the segment within a datagram.
    ///
    /// Returns `Err(Error::Unsupported)` if the datagram does not carry TCP.
    pub fn parse(packet: ip::Packet) -> Result<Self> {
        if packet.header.protocol != IpProtocol::Tcp {
            return Err(Error::Unsupported);
        }

        let tcp = TcpHeader::parse(packet.payload())?;
        Ok(Packet {
            ip: packet.header,
            tcp,
            frame: packet.frame,
        })
    }

    /// The connection this segment belongs to.
    pub fn ports(&self) -> PortPair {
        PortPair::new(self.tcp.src_port, self.tcp.dst_port)
    }

    /// The data carried by the segment.
    pub fn payload(&self) -> &[u8] {
        let start = self.ip.header_len() + self.tcp.header_len();
        let frame = self.frame.as_slice();
        &frame[start.min(frame.len())..]
    }

    /// The number of octets carried by the segment.
    ///
    /// The frame length minus both header lengths.
    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }
}
