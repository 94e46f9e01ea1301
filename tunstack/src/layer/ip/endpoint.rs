use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::Packet;
use crate::config::Config;
use crate::layer::{Error, Result, Workers};
use crate::nic::{Device, Frame, Link};
use crate::storage::Queue;

/// The network stage.
///
/// Parses frames from the link into [`Packet`]s for the transport layer and forwards composed
/// frames back to the link.
#[derive(Debug)]
pub struct Endpoint<D> {
    link: Arc<Link<D>>,
    ingress: Queue<Packet>,
    egress: Queue<Frame>,
    token: CancellationToken,
    workers: Workers,
}

impl<D: Device> Endpoint<D> {
    /// Create the stage on top of a link, it stops when `token` is cancelled.
    pub fn new(link: Arc<Link<D>>, config: &Config, token: CancellationToken) -> Self {
        Endpoint {
            link,
            ingress: Queue::new(config.queue_len),
            egress: Queue::new(config.queue_len),
            token,
            workers: Workers::default(),
        }
    }

    /// Start the receiving and the forwarding task.
    ///
    /// Calling this again has no effect.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub fn bind(self: &Arc<Self>) {
        if !self.workers.start() {
            net_debug!("ip: already bound");
            return;
        }

        self.workers.spawn(self.clone().receive());
        self.workers.spawn(self.clone().forward());
    }

    /// Take the next received packet, in arrival order.
    pub async fn read(&self) -> Result<Packet> {
        self.ingress.pop(&self.token).await
    }

    /// Queue a finished frame for the link, waiting while the queue is full.
    pub async fn write(&self, frame: Frame) -> Result<()> {
        self.egress.push(frame, &self.token).await
    }

    /// Shut the stage down, discarding queued packets.
    pub fn close(&self) {
        self.token.cancel();
        self.ingress.discard();
        self.egress.discard();
    }

    /// Wait for both tasks to end.
    pub async fn join(&self) -> Result<()> {
        self.workers.join().await
    }

    async fn receive(self: Arc<Self>) -> Result<()> {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                read = self.link.read() => read,
            };

            let frame = match read {
                Ok(frame) => frame,
                Err(Error::Closed) => return self.shutdown(),
                Err(err) => return Err(err),
            };

            let len = frame.len();
            let packet = match Packet::parse(frame) {
                Ok(packet) => packet,
                Err(err) => {
                    net_debug!("ip: dropping frame of {} octets: {}", len, err);
                    continue;
                }
            };

            net_trace!("ip: received {}", packet.header);
            match self.ingress.push(packet, &self.token).await {
                Ok(()) => (),
                Err(Error::Closed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    async fn forward(self: Arc<Self>) -> Result<()> {
        loop {
            let frame = match self.egress.pop(&self.token).await {
                Ok(frame) => frame,
                Err(Error::Closed) => return Ok(()),
                Err(err) => return Err(err),
            };

            let written = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                written = self.link.write(frame) => written,
            };

            match written {
                Ok(()) => (),
                Err(Error::Closed) => return self.shutdown(),
                Err(err) => return Err(err),
            }
        }
    }

    /// The link below went away.
    fn shutdown(&self) -> Result<()> {
        if !self.token.is_cancelled() {
            net_debug!("ip: link closed, shutting down");
            self.token.cancel();
        }
        Ok(())
    }
}
