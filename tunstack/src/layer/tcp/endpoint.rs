use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Connection, Manager, Packet, PortPair};
use crate::config::Config;
use crate::layer::{ip, Error, Result, Workers};
use crate::nic::{Device, Frame};
use crate::storage::Queue;
use crate::wire::TcpFlags;

/// The transport stage.
///
/// Feeds segments from the ip layer into the [`Manager`] and forwards the segments it and the
/// application compose down to the ip layer.
#[derive(Debug)]
pub struct Endpoint<D> {
    ip: Arc<ip::Endpoint<D>>,
    manager: Manager,
    egress: Queue<Frame>,
    token: CancellationToken,
    workers: Workers,
}

impl<D: Device> Endpoint<D> {
    /// Create the stage on top of the ip layer, it stops when `token` is cancelled.
    pub fn new(ip: Arc<ip::Endpoint<D>>, config: &Config, token: CancellationToken) -> Self {
        Endpoint {
            ip,
            manager: Manager::new(config.accept_len, token.clone()),
            egress: Queue::new(config.queue_len),
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
            net_debug!("tcp: already bound");
            return;
        }

        self.workers.spawn(self.clone().receive());
        self.workers.spawn(self.clone().transmit());
    }

    /// Wait for the next connection that received data.
    ///
    /// The connection is a snapshot taken right after the data was acknowledged. Its payload is
    /// the data of that segment.
    pub async fn accept(&self) -> Result<Connection> {
        self.manager.accept().await
    }

    /// Send a segment with the given flags and payload on a connection.
    ///
    /// Sequence and acknowledgment number come from the live connection, not from the snapshot
    /// passed in. Fails with `Error::NotConnected` once the connection has been removed and with
    /// `Error::PayloadTooLong` for a payload beyond [`MAX_PAYLOAD_LEN`](super::MAX_PAYLOAD_LEN).
    pub async fn write(&self, connection: &Connection, flags: TcpFlags, payload: &[u8]) -> Result<()> {
        self.manager.write(connection.ports(), flags, payload, &self.egress).await
    }

    /// A snapshot of the live connection with these ports.
    pub async fn find(&self, ports: PortPair) -> Option<Connection> {
        self.manager.find(ports).await
    }

    /// The connection table.
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Shut the stage down, discarding queued segments and unaccepted connections.
    pub fn close(&self) {
        self.token.cancel();
        self.egress.discard();
        self.manager.discard();
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
                read = self.ip.read() => read,
            };

            let packet = match read {
                Ok(packet) => packet,
                Err(Error::Closed) => return self.shutdown(),
                Err(err) => return Err(err),
            };

            let protocol = packet.header.protocol;
            let segment = match Packet::parse(packet) {
                Ok(segment) => segment,
                Err(err) => {
                    net_debug!("tcp: dropping {} datagram: {}", protocol, err);
                    continue;
                }
            };

            net_trace!("tcp: received {}", segment.tcp);
            match self.manager.receive(segment, &self.egress).await {
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

            let written = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                written = self.ip.write(frame) => written,
            };

            match written {
                Ok(()) => (),
                Err(Error::Closed) => return self.shutdown(),
                Err(err) => return Err(err),
            }
        }
    }

    /// The ip layer below went away.
    fn shutdown(&self) -> Result<()> {
        if !self.token.is_cancelled() {
            net_debug!("tcp: ip layer closed, shutting down");
            self.token.cancel();
        }
        Ok(())
    }
}
