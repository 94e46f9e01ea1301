//! The IP layer.
//!
//! Sits directly on the link. Every frame read from the device is expected to be a bare IPv4
//! datagram, there is no link layer header on a tun interface. The [`Endpoint`] parses the header
//! and hands the [`Packet`], header together with the unmodified frame, to the transport layer.
//!
//! Frames that do not hold an IPv4 header are dropped and logged without further consequence. In
//! particular this includes IPv6 traffic, which the kernel happily routes into the interface as
//! well. Checksums of inbound headers are not verified, neither are destination addresses: the
//! interface only receives what the host routed to it.
//!
//! It does **not** reassemble fragments, nor does it look at options beyond skipping them.
//!
//! ## Transmitting packets
//!
//! Outgoing frames are composed entirely by the layer above. The endpoint only forwards them to
//! the link, preserving their order.
mod endpoint;
mod packet;

#[cfg(test)]
mod tests;

pub use endpoint::Endpoint;
pub use packet::Packet;
