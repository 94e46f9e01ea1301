use std::collections::hash_map::{Entry, HashMap};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::connection::Signals;
use super::{Connection, Packet, PortPair, MAX_PAYLOAD_LEN};
use crate::layer::{Error, Result};
use crate::nic::Frame;
use crate::storage::Queue;
use crate::wire::{TcpFlags, TcpSeqNumber};

/// Owner of all connections.
///
/// Segments are applied one at a time and in arrival order, the table lock is held until all
/// replies for a segment have been queued. Writes by the application take the same lock, so its
/// segments never interleave with the replies to a single arriving segment.
#[derive(Debug)]
pub struct Manager {
    connections: Mutex<HashMap<PortPair, Connection>>,
    accepted: Queue<Connection>,
    token: CancellationToken,
}

impl Manager {
    /// Create an empty manager with room for `backlog` published connections.
    pub fn new(backlog: usize, token: CancellationToken) -> Self {
        Manager {
            connections: Mutex::new(HashMap::new()),
            accepted: Queue::new(backlog),
            token,
        }
    }

    /// Apply a received segment, queueing all replies into `out`.
    ///
    /// A segment for an unknown pair of ports opens a new connection only if it carries SYN, any
    /// other such segment is dropped. Publishing waits while the accept queue is full, which holds
    /// up all further segments but not writes on existing connections.
    pub(crate) async fn receive(&self, packet: Packet, out: &Queue<Frame>) -> Result<()> {
        let ports = packet.ports();
        let mut connections = self.connections.lock().await;

        let (connection, signals) = match connections.entry(ports) {
            Entry::Occupied(entry) => {
                let connection = entry.into_mut();
                let signals = connection.arrives(packet);
                (connection, signals)
            },
            Entry::Vacant(entry) if packet.tcp.flags.syn => {
                let initial_seq = TcpSeqNumber(rand::random::<u32>() >> 1);
                net_debug!("tcp: {} opened by {}, isn {}", ports, packet.ip.src_addr, initial_seq);
                let connection = entry.insert(Connection::new(packet, initial_seq));
                (connection, Signals::answer(TcpFlags::SYN_ACK))
            },
            Entry::Vacant(_) => {
                net_trace!("tcp: {} dropping {} without connection", ports, packet.tcp.flags);
                return Ok(());
            },
        };

        for flags in signals.answers {
            transmit(connection, flags, &[], out, &self.token).await?;
        }

        let snapshot = signals.publish.then(|| connection.clone());

        if signals.delete {
            connections.remove(&ports);
            net_debug!("tcp: {} closed", ports);
        }

        // Writes by the application must not wait on a full accept queue.
        drop(connections);

        if let Some(snapshot) = snapshot {
            self.accepted.push(snapshot, &self.token).await?;
        }

        Ok(())
    }

    /// Send a segment on a live connection, queueing it into `out`.
    ///
    /// Fails with `Error::NotConnected` if no connection with these ports exists and with
    /// `Error::PayloadTooLong` if the segment would not fit into a single datagram.
    pub(crate) async fn write(
        &self,
        ports: PortPair,
        flags: TcpFlags,
        payload: &[u8],
        out: &Queue<Frame>,
    ) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong(payload.len()));
        }

        let mut connections = self.connections.lock().await;
        let connection = connections
            .get_mut(&ports)
            .ok_or(Error::NotConnected(ports))?;
        transmit(connection, flags, payload, out, &self.token).await
    }

    /// Take the next connection that received data.
    pub async fn accept(&self) -> Result<Connection> {
        self.accepted.pop(&self.token).await
    }

    /// A snapshot of the live connection with these ports.
    pub async fn find(&self, ports: PortPair) -> Option<Connection> {
        self.connections.lock().await.get(&ports).cloned()
    }

    /// The number of live connections.
    pub async fn active(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Drop connections waiting to be accepted.
    pub(crate) fn discard(&self) {
        self.accepted.discard();
    }
}

async fn transmit(
    connection: &mut Connection,
    flags: TcpFlags,
    payload: &[u8],
    out: &Queue<Frame>,
    token: &CancellationToken,
) -> Result<()> {
    let frame = connection.segment(flags, payload);
    net_trace!("tcp: {} sending {} seq={} with {} octets",
        connection.ports(), flags, connection.next_seq(), payload.len());
    out.push(frame, token).await?;
    connection.advance(flags, payload.len());
    Ok(())
}
