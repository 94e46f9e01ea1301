//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. An endpoint represents the local state of a protocol layer and
//! runs two tasks: one moving parsed packets up towards the application and one moving composed
//! frames down towards the device. Neighbouring layers are connected by bounded queues only.
//!
//! ## Receiving
//!
//! The [`ip`] endpoint reads raw frames from the link and parses their IPv4 header. The [`tcp`]
//! endpoint takes those, parses the segment and feeds it into the connection state machine, which
//! decides on replies and on connections to hand to the application.
//!
//! ## Sending
//!
//! Replies are composed completely, both headers with checksums, in the TCP layer. Lower layers
//! forward the finished frame without looking at it.
//!
//! ## Shutdown
//!
//! Every endpoint owns a cancellation token. A stage stops when its own token is cancelled or when
//! the layer below reports `Error::Closed`, in which case it cancels its own token in turn. This
//! way a failing device shuts down the whole stack from the bottom up.
use std::io;

pub mod ip;
pub mod tcp;
mod workers;

pub(crate) use self::workers::Workers;

/// The result type of stack operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the stack to its user.
///
/// Parse errors of single packets are not part of this, they are dropped by the layer detecting
/// them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening, configuring, reading or writing the device failed.
    #[error("device error: {0}")]
    Device(#[from] io::Error),

    /// The stage has been shut down, no more packets pass.
    #[error("the stack is shut down")]
    Closed,

    /// The connection is not, or no longer, known to the stack.
    #[error("no connection between ports {0}")]
    NotConnected(tcp::PortPair),

    /// The payload does not fit into a single segment.
    #[error("payload of {0} octets exceeds a single segment")]
    PayloadTooLong(usize),

    /// A pipeline task did not run to completion.
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
