use crate::nic::Frame;
use crate::wire::{Error, Ipv4Header, Result};

/// A received datagram with its parsed header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// The header as parsed from the start of the frame.
    pub header: Ipv4Header,
    /// The complete frame, header included.
    pub frame: Frame,
}

impl Packet {
    /// Parse the IPv4 header of a frame.
    ///
    /// Returns `Err(Error::Unsupported)` for any other IP version.
    pub fn parse(frame: Frame) -> Result<Self> {
        let header = Ipv4Header::parse(frame.as_slice())?;
        if header.version != 4 {
            return Err(Error::Unsupported);
        }
        Ok(Packet { header, frame })
    }

    /// The octets following the IP header.
    pub fn payload(&self) -> &[u8] {
        &self.frame.as_slice()[self.header.header_len()..]
    }
}
