//! A software device whose frames come from and go to channels.
//!
//! The other end of the channels is a [`Remote`], playing the peer host. Useful for driving the
//! stack in tests without a tun interface.
use std::io;

use tokio::sync::{mpsc, Mutex};

use super::Device;

/// The stack side of an in-memory device.
#[derive(Debug)]
pub struct External {
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// The peer side of an [`External`] device.
#[derive(Debug)]
pub struct Remote {
    inject: mpsc::Sender<Vec<u8>>,
    sent: mpsc::Receiver<Vec<u8>>,
}

impl External {
    /// Create a connected pair, each direction buffering up to `capacity` frames.
    ///
    /// The device does not complete a `send` while `capacity` frames are waiting for the remote,
    /// so a remote that never receives simulates a stuck device.
    pub fn new(capacity: usize) -> (External, Remote) {
        let (inject, inbound) = mpsc::channel(capacity);
        let (outbound, sent) = mpsc::channel(capacity);
        let device = External {
            inbound: Mutex::new(inbound),
            outbound,
        };
        (device, Remote { inject, sent })
    }
}

impl Device for External {
    async fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let frame = self.inbound.lock().await.recv().await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "remote hung up"))?;
        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    async fn send(&self, buffer: &[u8]) -> io::Result<usize> {
        self.outbound.send(buffer.to_vec()).await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "remote hung up"))?;
        Ok(buffer.len())
    }
}

impl Remote {
    /// Deliver a frame to the stack.
    ///
    /// Returns `false` if the device is gone.
    pub async fn inject(&self, frame: Vec<u8>) -> bool {
        self.inject.send(frame).await.is_ok()
    }

    /// Wait for the next frame the stack sent.
    ///
    /// Returns `None` if the device is gone.
    pub async fn receive(&mut self) -> Option<Vec<u8>> {
        self.sent.recv().await
    }

    /// Take a frame the stack sent if one is available right now.
    pub fn try_receive(&mut self) -> Option<Vec<u8>> {
        self.sent.try_recv().ok()
    }
}
