use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::Config;
use crate::layer::{ip, Error};
use crate::nic::external::{External, Remote};
use crate::nic::{Frame, Link};
use crate::wire::{ipv4_packet, tcp_packet};
use crate::wire::{IpProtocol, Ipv4Address, Ipv4Header, TcpFlags, TcpHeader, TcpSeqNumber};

const PEER_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);
const LOCAL_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
const PEER_PORT: u16 = 40000;
const LOCAL_PORT: u16 = 80;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

fn ports() -> PortPair {
    PortPair::new(PEER_PORT, LOCAL_PORT)
}

/// A segment as sent by the peer.
fn segment(seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
    segment_from(PEER_PORT, seq, ack, flags, payload)
}

/// A segment as sent by the peer from another of its ports.
fn segment_from(port: u16, seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
    let tcp = TcpHeader::new(port, LOCAL_PORT, TcpSeqNumber(seq), TcpSeqNumber(ack), flags);
    let ip = Ipv4Header::new(PEER_ADDR, LOCAL_ADDR, tcp.buffer_len() + payload.len());
    let mut bytes = ip.marshal();
    bytes.extend(tcp.marshal(&ip, payload));
    bytes
}

fn packet(bytes: Vec<u8>) -> Packet {
    let datagram = ip::Packet::parse(Frame::from(bytes)).unwrap();
    Packet::parse(datagram).unwrap()
}

struct Harness {
    link: Arc<Link<External>>,
    tcp: Arc<Endpoint<External>>,
    remote: Remote,
    root: CancellationToken,
}

impl Harness {
    fn new(config: Config, capacity: usize) -> Self {
        let root = CancellationToken::new();
        let (device, remote) = External::new(capacity);
        let link = Arc::new(Link::new(device, &config, root.child_token()));
        let ip = Arc::new(ip::Endpoint::new(link.clone(), &config, root.child_token()));
        let tcp = Arc::new(Endpoint::new(ip.clone(), &config, root.child_token()));
        link.bind();
        ip.bind();
        tcp.bind();
        Harness { link, tcp, remote, root }
    }

    async fn send(&self, seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) {
        self.send_from(PEER_PORT, seq, ack, flags, payload).await;
    }

    async fn send_from(&self, port: u16, seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) {
        assert!(self.remote.inject(segment_from(port, seq, ack, flags, payload)).await);
    }

    async fn expect(&mut self) -> (TcpHeader, Vec<u8>) {
        self.expect_to(PEER_PORT).await
    }

    /// The next segment from the stack, checked for valid addressing and checksums.
    async fn expect_to(&mut self, port: u16) -> (TcpHeader, Vec<u8>) {
        let bytes = timeout(WAIT, self.remote.receive()).await
            .expect("no segment sent")
            .expect("device gone");

        let datagram = ipv4_packet::new_checked(&bytes).unwrap();
        assert!(datagram.verify_checksum());
        assert_eq!(datagram.src_addr(), LOCAL_ADDR);
        assert_eq!(datagram.dst_addr(), PEER_ADDR);
        assert_eq!(datagram.protocol(), IpProtocol::Tcp);
        assert_eq!(usize::from(datagram.total_len()), bytes.len());

        let segment = tcp_packet::new_checked(&bytes[20..]).unwrap();
        assert!(segment.verify_checksum(LOCAL_ADDR, PEER_ADDR));
        let header = TcpHeader::parse(&bytes[20..]).unwrap();
        assert_eq!(header.src_port, LOCAL_PORT);
        assert_eq!(header.dst_port, port);
        (header, segment.payload_slice().to_vec())
    }

    async fn expect_quiet(&mut self) {
        sleep(QUIET).await;
        assert_eq!(self.remote.try_receive(), None);
    }

    async fn wait_for(&self, state: Option<State>) {
        self.wait_for_ports(ports(), state).await;
    }

    async fn wait_for_ports(&self, ports: PortPair, state: Option<State>) {
        let poll = async {
            while self.tcp.find(ports).await.map(|conn| conn.state()) != state {
                sleep(Duration::from_millis(5)).await;
            }
        };
        timeout(WAIT, poll).await.expect("state not reached");
    }

    /// Complete the handshake, returning our initial sequence number.
    async fn establish(&mut self, seq: u32) -> u32 {
        self.establish_from(PEER_PORT, seq).await
    }

    async fn establish_from(&mut self, port: u16, seq: u32) -> u32 {
        self.send_from(port, seq, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]).await;
        let (syn_ack, _) = self.expect_to(port).await;
        let isn = syn_ack.seq_number.0;
        self.send_from(port, seq + 1, isn.wrapping_add(1), TcpFlags::ACK, &[]).await;
        self.wait_for_ports(PortPair::new(port, LOCAL_PORT), Some(State::Established)).await;
        isn
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new(Config::default(), 8)
    }
}

#[tokio::test]
async fn syn_opens() {
    let mut harness = Harness::default();
    harness.send(1000, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]).await;

    let (reply, payload) = harness.expect().await;
    assert_eq!(reply.flags, TcpFlags::SYN_ACK);
    assert_eq!(reply.ack_number, TcpSeqNumber(1001));
    assert!(payload.is_empty());

    let conn = harness.tcp.find(ports()).await.unwrap();
    assert_eq!(conn.state(), State::SynReceived);
    assert_eq!(reply.seq_number, conn.initial_seq());
    assert_eq!(conn.sent(), 1);

    harness.expect_quiet().await;
}

#[tokio::test]
async fn handshake_and_data() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;
    harness.expect_quiet().await;

    harness.send(1001, isn + 1, TcpFlags::PSH_ACK, b"hello").await;
    let (ack, _) = harness.expect().await;
    assert_eq!(ack.flags, TcpFlags::ACK);
    assert_eq!(ack.seq_number, TcpSeqNumber(isn + 1));
    assert_eq!(ack.ack_number, TcpSeqNumber(1006));

    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();
    assert_eq!(conn.payload(), b"hello");
    assert_eq!(conn.state(), State::Established);
    assert_eq!(conn.remote_addr(), PEER_ADDR);
    assert_eq!(conn.remote_port(), PEER_PORT);
    assert_eq!(conn.local_port(), LOCAL_PORT);
}

#[tokio::test]
async fn application_writes() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;
    harness.send(1001, isn + 1, TcpFlags::PSH_ACK, b"hello").await;
    let _ = harness.expect().await;
    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();

    harness.tcp.write(&conn, TcpFlags::PSH_ACK, b"world").await.unwrap();
    let (reply, payload) = harness.expect().await;
    assert_eq!(reply.flags, TcpFlags::PSH_ACK);
    assert_eq!(reply.seq_number, TcpSeqNumber(isn + 1));
    assert_eq!(reply.ack_number, TcpSeqNumber(1006));
    assert_eq!(payload, b"world");

    // The stale snapshot still writes with the live numbers.
    harness.tcp.write(&conn, TcpFlags::PSH_ACK, b"!").await.unwrap();
    let (reply, payload) = harness.expect().await;
    assert_eq!(reply.seq_number, TcpSeqNumber(isn + 6));
    assert_eq!(payload, b"!");
}

#[tokio::test]
async fn passive_close() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;

    harness.send(1001, isn + 1, TcpFlags::FIN_ACK, &[]).await;
    let (ack, _) = harness.expect().await;
    assert_eq!(ack.flags, TcpFlags::ACK);
    assert_eq!(ack.ack_number, TcpSeqNumber(1002));
    let (fin, _) = harness.expect().await;
    assert_eq!(fin.flags, TcpFlags::FIN_ACK);
    assert_eq!(fin.seq_number, TcpSeqNumber(isn + 1));
    assert_eq!(fin.ack_number, TcpSeqNumber(1002));
    harness.wait_for(Some(State::LastAck)).await;

    harness.send(1002, isn + 2, TcpFlags::ACK, &[]).await;
    harness.wait_for(None).await;
    assert_eq!(harness.tcp.manager().active().await, 0);
    harness.expect_quiet().await;
}

#[tokio::test]
async fn write_after_close() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;
    harness.send(1001, isn + 1, TcpFlags::PSH_ACK, b"hi").await;
    let _ = harness.expect().await;
    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();

    harness.send(1003, isn + 1, TcpFlags::FIN_ACK, &[]).await;
    let _ = harness.expect().await;
    let _ = harness.expect().await;
    harness.send(1004, isn + 2, TcpFlags::ACK, &[]).await;
    harness.wait_for(None).await;

    let written = harness.tcp.write(&conn, TcpFlags::PSH_ACK, b"late").await;
    assert!(matches!(written, Err(Error::NotConnected(pair)) if pair == ports()));
}

#[tokio::test]
async fn data_with_fin() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;

    let flags = TcpFlags { fin: true, ..TcpFlags::PSH_ACK };
    harness.send(1001, isn + 1, flags, b"bye").await;
    let replies = [harness.expect().await.0, harness.expect().await.0, harness.expect().await.0];
    assert_eq!(replies[0].flags, TcpFlags::ACK);
    assert_eq!(replies[1].flags, TcpFlags::ACK);
    assert_eq!(replies[2].flags, TcpFlags::FIN_ACK);
    assert_eq!(replies[2].ack_number, TcpSeqNumber(1004));

    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();
    assert_eq!(conn.payload(), b"bye");
    harness.wait_for(Some(State::LastAck)).await;
}

#[tokio::test]
async fn stray_segment_ignored() {
    let mut harness = Harness::default();
    harness.send(5000, 1, TcpFlags::ACK, &[]).await;
    harness.send(5000, 1, TcpFlags::PSH_ACK, b"lost").await;
    harness.expect_quiet().await;
    assert!(harness.tcp.find(ports()).await.is_none());
    assert_eq!(harness.tcp.manager().active().await, 0);
}

#[tokio::test]
async fn stuck_device_blocks_writes() {
    let config = Config { queue_len: 1, ..Config::default() };
    let mut harness = Harness::new(config, 1);
    let isn = harness.establish(1000).await;
    harness.send(1001, isn + 1, TcpFlags::PSH_ACK, b"go").await;
    let _ = harness.expect().await;
    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();

    // The remote stops receiving from here on.
    let tcp = harness.tcp.clone();
    let writer = tokio::spawn(async move {
        loop {
            if let Err(err) = tcp.write(&conn, TcpFlags::PSH_ACK, b"flood").await {
                return err;
            }
        }
    });

    sleep(QUIET).await;
    assert!(!writer.is_finished());

    harness.root.cancel();
    let err = timeout(WAIT, writer).await.unwrap().unwrap();
    assert!(matches!(err, Error::Closed));
    assert!(harness.link.is_closed());
}

#[tokio::test]
async fn full_backlog_allows_writes() {
    let config = Config { accept_len: 1, ..Config::default() };
    let mut harness = Harness::new(config, 8);
    let isn_a = harness.establish_from(41000, 100).await;
    let isn_b = harness.establish_from(41001, 200).await;
    let isn_c = harness.establish_from(41002, 300).await;

    harness.send_from(41000, 101, isn_a + 1, TcpFlags::PSH_ACK, b"a").await;
    let _ = harness.expect_to(41000).await;
    let a = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();

    // B fills the backlog, publishing C has to wait for it.
    harness.send_from(41001, 201, isn_b + 1, TcpFlags::PSH_ACK, b"b").await;
    let _ = harness.expect_to(41001).await;
    harness.send_from(41002, 301, isn_c + 1, TcpFlags::PSH_ACK, b"c").await;
    let _ = harness.expect_to(41002).await;

    timeout(WAIT, harness.tcp.write(&a, TcpFlags::PSH_ACK, b"reply")).await
        .expect("write blocked by the backlog")
        .unwrap();
    let (reply, payload) = harness.expect_to(41000).await;
    assert_eq!(reply.seq_number, TcpSeqNumber(isn_a + 1));
    assert_eq!(payload, b"reply");

    let b = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();
    assert_eq!(b.payload(), b"b");
    let c = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();
    assert_eq!(c.payload(), b"c");
}

#[tokio::test]
async fn oversized_write_rejected() {
    let mut harness = Harness::default();
    let isn = harness.establish(1000).await;
    harness.send(1001, isn + 1, TcpFlags::PSH_ACK, b"big").await;
    let _ = harness.expect().await;
    let conn = timeout(WAIT, harness.tcp.accept()).await.unwrap().unwrap();

    let oversized = vec![0x55; MAX_PAYLOAD_LEN + 1];
    let written = harness.tcp.write(&conn, TcpFlags::PSH_ACK, &oversized).await;
    assert!(matches!(written, Err(Error::PayloadTooLong(len)) if len == MAX_PAYLOAD_LEN + 1));
    harness.expect_quiet().await;

    // The largest payload still fits and the rejected one used no sequence numbers.
    let largest = vec![0x55; MAX_PAYLOAD_LEN];
    harness.tcp.write(&conn, TcpFlags::PSH_ACK, &largest).await.unwrap();
    let (reply, payload) = harness.expect().await;
    assert_eq!(reply.seq_number, TcpSeqNumber(isn + 1));
    assert_eq!(payload.len(), MAX_PAYLOAD_LEN);
}

#[tokio::test]
async fn other_protocols_ignored() {
    let mut harness = Harness::default();
    let mut udp = segment(1000, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]);
    udp[9] = 0x11;
    assert!(harness.remote.inject(udp).await);
    harness.expect_quiet().await;
    assert_eq!(harness.tcp.manager().active().await, 0);

    harness.send(1000, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]).await;
    let (reply, _) = harness.expect().await;
    assert_eq!(reply.flags, TcpFlags::SYN_ACK);
}

#[tokio::test]
async fn closed_below_ends_accept() {
    let harness = Harness::default();
    harness.link.close();
    let accepted = timeout(WAIT, harness.tcp.accept()).await.unwrap();
    assert!(matches!(accepted, Err(Error::Closed)));
    timeout(WAIT, harness.tcp.join()).await.unwrap().unwrap();
}

#[test]
fn port_pair_unordered() {
    assert_eq!(PortPair::new(80, 40000), PortPair::new(40000, 80));
    assert_eq!(PortPair::new(80, 40000).low(), 80);
    assert_eq!(PortPair::new(80, 40000).high(), 40000);
    assert_ne!(PortPair::new(80, 40000), PortPair::new(80, 40001));
}

#[test]
fn parse_segment() {
    let parsed = packet(segment(7, 9, TcpFlags::PSH_ACK, b"data"));
    assert_eq!(parsed.ports(), ports());
    assert_eq!(parsed.tcp.seq_number, TcpSeqNumber(7));
    assert_eq!(parsed.payload_len(), 4);
    assert_eq!(parsed.payload(), b"data");

    let mut udp = segment(7, 9, TcpFlags::ACK, &[]);
    udp[9] = 0x11;
    let datagram = ip::Packet::parse(Frame::from(udp)).unwrap();
    assert_eq!(Packet::parse(datagram).unwrap_err(), crate::wire::Error::Unsupported);

    let mut short_offset = segment(7, 9, TcpFlags::ACK, &[]);
    short_offset[32] = 0x40;
    let datagram = ip::Packet::parse(Frame::from(short_offset)).unwrap();
    assert_eq!(Packet::parse(datagram).unwrap_err(), crate::wire::Error::Malformed);
}

#[test]
fn state_machine() {
    let syn = packet(segment(100, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]));
    let mut conn = Connection::new(syn, TcpSeqNumber(5000));
    assert_eq!(conn.state(), State::SynReceived);
    assert_eq!(conn.ack_number(), TcpSeqNumber(101));
    conn.advance(TcpFlags::SYN_ACK, 0);
    assert_eq!(conn.next_seq(), TcpSeqNumber(5001));

    // A repeated SYN changes nothing.
    let again = conn.arrives(packet(segment(100, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[])));
    assert_eq!(again, connection::Signals::default());
    assert_eq!(conn.state(), State::SynReceived);

    let handshake = conn.arrives(packet(segment(101, 5001, TcpFlags::ACK, &[])));
    assert!(handshake.answers.is_empty());
    assert_eq!(conn.state(), State::Established);

    let data = conn.arrives(packet(segment(101, 5001, TcpFlags::PSH_ACK, b"12345")));
    assert_eq!(data.answers, vec![TcpFlags::ACK]);
    assert!(data.publish);
    assert_eq!(conn.ack_number(), TcpSeqNumber(106));

    conn.advance(TcpFlags::PSH_ACK, 3);
    assert_eq!(conn.next_seq(), TcpSeqNumber(5004));

    let fin = conn.arrives(packet(segment(106, 5004, TcpFlags::FIN_ACK, &[])));
    assert_eq!(fin.answers, vec![TcpFlags::ACK, TcpFlags::FIN_ACK]);
    assert!(!fin.publish);
    assert!(!fin.delete);
    assert_eq!(conn.state(), State::LastAck);

    let last = conn.arrives(packet(segment(107, 5005, TcpFlags::ACK, &[])));
    assert!(last.delete);
    assert!(last.answers.is_empty());
}

#[test]
fn compose_reply() {
    let syn = packet(segment(u32::MAX, 0, TcpFlags { syn: true, ..TcpFlags::NONE }, &[]));
    let conn = Connection::new(syn, TcpSeqNumber(77));
    let frame = conn.segment(TcpFlags::SYN_ACK, &[]);
    let bytes = frame.as_slice();
    assert_eq!(bytes.len(), 40);

    let datagram = ipv4_packet::new_checked(bytes).unwrap();
    assert!(datagram.verify_checksum());
    assert_eq!(datagram.src_addr(), LOCAL_ADDR);
    assert_eq!(datagram.ttl(), 64);

    let header = TcpHeader::parse(&bytes[20..]).unwrap();
    assert_eq!(header.seq_number, TcpSeqNumber(77));
    // Acknowledgment wraps around.
    assert_eq!(header.ack_number, TcpSeqNumber(0));
    assert_eq!(header.window_len, 65535);
    assert!(tcp_packet::new_checked(&bytes[20..]).unwrap().verify_checksum(LOCAL_ADDR, PEER_ADDR));
}
