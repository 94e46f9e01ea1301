//! Buffering between the tasks of the pipeline.
//!
//! Every stage hands packets upward and downward through a bounded [`Queue`]. A full queue blocks
//! its producer, so a slow device throttles the transport layer above it.
mod queue;

pub use self::queue::Queue;
