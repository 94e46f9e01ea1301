//! The TCP layer.
//!
//! Serves passive connections only: a connection begins with a SYN from the peer, transfers data
//! in both directions after the handshake and ends when the peer sends a FIN. There is no
//! retransmission, no reassembly of out-of-order segments, no window management and no RST.
//!
//! ## Structure
//!
//! The [`Endpoint`] is the pipeline stage between the ip layer and the application. Its receiving
//! task parses segments and hands each one synchronously to the [`Manager`], which owns all
//! [`Connection`]s. The manager applies the state machine of the connection, sends the replies it
//! asks for and publishes connections with new data to the application.
//!
//! Connections are identified by their pair of ports alone, addresses play no part. Two peers
//! using the same source port towards the same local port would be confused for one another.
//!
//! ## States
//!
//! | State         | Segment  | Reply             | Next state    |
//! |---------------|----------|-------------------|---------------|
//! | (none)        | SYN      | SYN+ACK           | `SynReceived` |
//! | `SynReceived` | ACK      |                   | `Established` |
//! | `Established` | PSH      | ACK, then publish | `Established` |
//! | `Established` | FIN      | ACK, then FIN+ACK | `LastAck`     |
//! | `LastAck`     | ACK      |                   | (removed)     |
//!
//! Every other combination is ignored. A segment in `Established` with both PSH and FIN runs the
//! PSH row and then the FIN row.
//!
//! ## Sequence numbers
//!
//! Each reply acknowledges the sequence number of the last received segment plus its payload
//! length, or plus one for a segment without payload. Our own sequence number is the initial one,
//! chosen at random per connection, plus all octets and SYN and FIN flags sent so far.
mod connection;
mod endpoint;
mod manager;
mod packet;

#[cfg(test)]
mod tests;

pub use connection::{Connection, PortPair, State, MAX_PAYLOAD_LEN};
pub use endpoint::Endpoint;
pub use manager::Manager;
pub use packet::Packet;
