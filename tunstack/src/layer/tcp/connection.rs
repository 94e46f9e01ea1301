use core::fmt;

use crate::nic::Frame;
use crate::wire::{Ipv4Address, Ipv4Header, TcpFlags, TcpHeader, TcpSeqNumber};
use crate::wire::{IPV4_HEADER_LEN, TCP_HEADER_LEN};

use super::Packet;

/// The largest payload a single segment can carry.
///
/// Both headers and the payload must fit into the 16 bit total length of the datagram.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - IPV4_HEADER_LEN - TCP_HEADER_LEN;

/// The unordered pair of ports identifying a connection.
///
/// The pair is normalized so that both directions of a connection yield the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortPair {
    low: u16,
    high: u16,
}

/// The state of a passive connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// A SYN arrived and was answered, waiting for the ACK completing the handshake.
    SynReceived,
    /// Data may flow in both directions.
    Established,
    /// The peer sent its FIN.
    CloseWait,
    /// Our own FIN was sent, waiting for its acknowledgment.
    LastAck,
}

/// A connection and the last segment received on it.
///
/// The values handed to the application are snapshots. Writes always go through the live
/// connection kept by the [`Manager`](super::Manager).
#[derive(Clone, Debug)]
pub struct Connection {
    ports: PortPair,
    state: State,
    last: Packet,
    initial_seq: TcpSeqNumber,
    sent: u32,
}

/// What the manager has to do after a segment arrived.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Signals {
    /// Replies to send, in order, each without payload.
    pub(crate) answers: Vec<TcpFlags>,
    /// Hand a snapshot to the application after the replies.
    pub(crate) publish: bool,
    /// Forget the connection.
    pub(crate) delete: bool,
}

impl PortPair {
    /// Create the pair from both ports, in any order.
    pub fn new(a: u16, b: u16) -> Self {
        PortPair {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// The smaller of both ports.
    pub fn low(self) -> u16 {
        self.low
    }

    /// The larger of both ports.
    pub fn high(self) -> u16 {
        self.high
    }
}

impl Connection {
    /// A new connection for an opening SYN.
    pub(crate) fn new(syn: Packet, initial_seq: TcpSeqNumber) -> Self {
        Connection {
            ports: syn.ports(),
            state: State::SynReceived,
            last: syn,
            initial_seq,
            sent: 0,
        }
    }

    /// The key of the connection.
    pub fn ports(&self) -> PortPair {
        self.ports
    }

    /// The state of the connection.
    pub fn state(&self) -> State {
        self.state
    }

    /// The last received segment.
    pub fn packet(&self) -> &Packet {
        &self.last
    }

    /// The data of the last received segment.
    pub fn payload(&self) -> &[u8] {
        self.last.payload()
    }

    /// The address of the peer.
    pub fn remote_addr(&self) -> Ipv4Address {
        self.last.ip.src_addr
    }

    /// The port of the peer.
    pub fn remote_port(&self) -> u16 {
        self.last.tcp.src_port
    }

    /// Our own address, as addressed by the peer.
    pub fn local_addr(&self) -> Ipv4Address {
        self.last.ip.dst_addr
    }

    /// Our own port.
    pub fn local_port(&self) -> u16 {
        self.last.tcp.dst_port
    }

    /// Our randomly chosen initial sequence number.
    pub fn initial_seq(&self) -> TcpSeqNumber {
        self.initial_seq
    }

    /// Count of sequence numbers we have used, SYN and FIN included.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// The sequence number of the next segment we send.
    pub fn next_seq(&self) -> TcpSeqNumber {
        self.initial_seq + self.sent
    }

    /// The acknowledgment number of the next segment we send.
    ///
    /// A segment without payload is acknowledged as if it occupied one sequence number.
    pub fn ack_number(&self) -> TcpSeqNumber {
        let len = self.last.payload_len().max(1);
        self.last.tcp.seq_number + len as u32
    }

    /// Apply a newly arrived segment.
    ///
    /// The segment replaces the last one, also when it is ignored. Flags are considered in the
    /// state the connection had on arrival, the PSH part of a segment before its FIN part.
    pub(crate) fn arrives(&mut self, packet: Packet) -> Signals {
        let flags = packet.tcp.flags;
        let mut signals = Signals::default();
        self.last = packet;

        match self.state {
            State::SynReceived if flags.ack => {
                self.change(State::Established);
            },
            State::Established if flags.psh || flags.fin => {
                if flags.psh {
                    signals.answers.push(TcpFlags::ACK);
                    signals.publish = true;
                }
                if flags.fin {
                    signals.answers.push(TcpFlags::ACK);
                    self.change(State::CloseWait);
                    signals.answers.push(TcpFlags::FIN_ACK);
                    self.change(State::LastAck);
                }
            },
            State::LastAck if flags.ack => {
                signals.delete = true;
            },
            state => {
                net_trace!("tcp: {} ignoring {} in {}", self.ports, flags, state);
            },
        }

        signals
    }

    /// Compose the segment with the given flags and payload.
    ///
    /// The addresses and ports are those of the last received segment, swapped. The payload must
    /// not be longer than [`MAX_PAYLOAD_LEN`].
    pub(crate) fn segment(&self, flags: TcpFlags, payload: &[u8]) -> Frame {
        let ip = Ipv4Header::new(
            self.local_addr(),
            self.remote_addr(),
            TCP_HEADER_LEN + payload.len());
        let tcp = TcpHeader::new(
            self.local_port(),
            self.remote_port(),
            self.next_seq(),
            self.ack_number(),
            flags);

        let mut buffer = vec![0; IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len()];
        let (ip_buffer, tcp_buffer) = buffer.split_at_mut(IPV4_HEADER_LEN);
        tcp_buffer[TCP_HEADER_LEN..].copy_from_slice(payload);
        ip.emit(ip_buffer);
        tcp.emit(tcp_buffer, &ip);
        Frame::from(buffer)
    }

    /// Account for a sent segment.
    pub(crate) fn advance(&mut self, flags: TcpFlags, len: usize) {
        self.sent = self.sent
            .wrapping_add(len as u32)
            .wrapping_add(flags.sequence_len());
    }

    fn change(&mut self, state: State) {
        net_debug!("tcp: {} {} -> {}", self.ports, self.state, state);
        self.state = state;
    }
}

impl Signals {
    pub(crate) fn answer(flags: TcpFlags) -> Self {
        Signals {
            answers: vec![flags],
            ..Signals::default()
        }
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::SynReceived => "SYN-RECEIVED",
            State::Established => "ESTABLISHED",
            State::CloseWait => "CLOSE-WAIT",
            State::LastAck => "LAST-ACK",
        };
        f.write_str(name)
    }
}
