//! Encapsulates a network interface.
//!
//! A [`Device`] moves single frames, in this stack always complete IPv4 datagrams without any
//! link layer header, between the host and the stack. The [`Link`] wraps one device into the
//! first pipeline stage, decoupling the device from the protocol layers with two queues.
//!
//! The operating system interface is in [`sys`], a purely software device usable for tests in
//! [`external`].
use std::future::Future;
use std::io;

pub mod external;
mod link;
#[cfg(target_os = "linux")]
pub mod sys;

pub use self::link::Link;

/// A raw frame as read from or written to a device.
///
/// The buffer is owned and never modified after construction. Only the first `len` octets are
/// valid, the buffer itself may be longer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    buffer: Vec<u8>,
    len: usize,
}

impl Frame {
    /// Wrap a buffer of which only a prefix is valid.
    ///
    /// A `len` beyond the buffer is clamped to the buffer length.
    pub fn new(buffer: Vec<u8>, len: usize) -> Self {
        let len = len.min(buffer.len());
        Frame { buffer, len }
    }

    /// The valid octets.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The number of valid octets.
    pub fn len(&self) -> usize {
        self.len
    }

    /// If no octet is valid.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(buffer: Vec<u8>) -> Self {
        let len = buffer.len();
        Frame { buffer, len }
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// A device exchanging whole IP datagrams.
///
/// Both operations are asynchronous and are polled from separate tasks concurrently, one task
/// receiving and one sending. An error returned from either is considered fatal for the device.
pub trait Device: Send + Sync + 'static {
    /// Receive a single frame into the buffer, returning its length.
    ///
    /// Frames longer than the buffer are truncated.
    fn recv(&self, buffer: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Send a single frame from the buffer.
    fn send(&self, buffer: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_prefix() {
        let frame = Frame::new(vec![1, 2, 3, 4], 2);
        assert_eq!(frame.as_slice(), &[1, 2]);
        assert_eq!(frame.len(), 2);

        let clamped = Frame::new(vec![1, 2], 8);
        assert_eq!(clamped.len(), 2);

        let whole = Frame::from(vec![9; 3]);
        assert_eq!(whole.as_ref(), &[9, 9, 9]);
        assert!(!whole.is_empty());
    }
}
