use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Device, Frame};
use crate::config::Config;
use crate::layer::{Error, Result, Workers};
use crate::storage::Queue;

/// The link stage, a device with an ingress and an egress queue.
///
/// After [`bind`] one task reads frames from the device into the ingress queue and another writes
/// frames from the egress queue to the device. Frames pass in strict FIFO order in both
/// directions.
///
/// [`bind`]: #method.bind
#[derive(Debug)]
pub struct Link<D> {
    device: Arc<D>,
    ingress: Queue<Frame>,
    egress: Queue<Frame>,
    frame_len: usize,
    token: CancellationToken,
    workers: Workers,
}

impl<D: Device> Link<D> {
    /// Wrap a device, the stage stops when `token` is cancelled.
    pub fn new(device: D, config: &Config, token: CancellationToken) -> Self {
        Link {
            device: Arc::new(device),
            ingress: Queue::new(config.queue_len),
            egress: Queue::new(config.queue_len),
            frame_len: config.frame_len,
            token,
            workers: Workers::default(),
        }
    }

    /// Start the receiving and the transmitting task.
    ///
    /// Calling this again has no effect.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub fn bind(self: &Arc<Self>) {
        if !self.workers.start() {
            net_debug!("link: already bound");
            return;
        }

        self.workers.spawn(self.clone().receive());
        self.workers.spawn(self.clone().transmit());
    }

    /// Take the next received frame.
    ///
    /// Fails with `Error::Closed` once the stage is shut down.
    pub async fn read(&self) -> Result<Frame> {
        self.ingress.pop(&self.token).await
    }

    /// Queue a frame for transmission, waiting while the egress queue is full.
    ///
    /// Fails with `Error::Closed` once the stage is shut down.
    pub async fn write(&self, frame: Frame) -> Result<()> {
        self.egress.push(frame, &self.token).await
    }

    /// Shut the stage down.
    ///
    /// Queued frames in both directions are discarded, not flushed.
    pub fn close(&self) {
        self.token.cancel();
        self.ingress.discard();
        self.egress.discard();
    }

    /// If the stage has been shut down.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for both tasks to end, reporting a device failure.
    pub async fn join(&self) -> Result<()> {
        self.workers.join().await
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    async fn receive(self: Arc<Self>) -> Result<()> {
        loop {
            let mut buffer = vec![0; self.frame_len];
            let received = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                received = self.device.recv(&mut buffer) => received,
            };

            let len = match received {
                Ok(len) => len,
                Err(err) => {
                    net_error!("link: device read failed: {}", err);
                    self.token.cancel();
                    return Err(Error::Device(err));
                }
            };

            if len == self.frame_len {
                net_warn!("link: frame filled the whole buffer of {} octets, may be truncated", len);
            }

            let frame = Frame::new(buffer, len);
            net_trace!("link: received frame of {} octets", frame.len());
            match self.ingress.push(frame, &self.token).await {
                Ok(()) => (),
                Err(Error::Closed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    async fn transmit(self: Arc<Self>) -> Result<()> {
        loop {
            let frame = match self.egress.pop(&self.token).await {
                Ok(frame) => frame,
                Err(Error::Closed) => return Ok(()),
                Err(err) => return Err(err),
            };

            let sent = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                sent = self.device.send(frame.as_slice()) => sent,
            };

            match sent {
                Ok(_) => net_trace!("link: sent frame of {} octets", frame.len()),
                Err(err) => {
                    net_error!("link: device write failed: {}", err);
                    self.token.cancel();
                    return Err(Error::Device(err));
                }
            }
        }
    }
}
