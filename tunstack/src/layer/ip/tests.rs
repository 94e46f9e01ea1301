use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::Config;
use crate::layer::Error;
use crate::nic::external::{External, Remote};
use crate::nic::{Frame, Link};
use crate::wire::{IpProtocol, Ipv4Address, Ipv4Header};

const SRC_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);
const DST_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);

const WAIT: Duration = Duration::from_secs(2);

fn datagram(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Ipv4Header::new(SRC_ADDR, DST_ADDR, payload.len()).marshal();
    bytes.extend_from_slice(payload);
    bytes
}

fn setup() -> (Arc<Link<External>>, Arc<Endpoint<External>>, Remote, CancellationToken) {
    let config = Config::default();
    let root = CancellationToken::new();
    let (device, remote) = External::new(4);
    let link = Arc::new(Link::new(device, &config, root.child_token()));
    let ip = Arc::new(Endpoint::new(link.clone(), &config, root.child_token()));
    link.bind();
    ip.bind();
    (link, ip, remote, root)
}

#[tokio::test]
async fn receive_ipv4() {
    let (_link, ip, remote, _root) = setup();
    assert!(remote.inject(datagram(b"abcd")).await);

    let packet = timeout(WAIT, ip.read()).await.unwrap().unwrap();
    assert_eq!(packet.header.src_addr, SRC_ADDR);
    assert_eq!(packet.header.dst_addr, DST_ADDR);
    assert_eq!(packet.header.protocol, IpProtocol::Tcp);
    assert_eq!(packet.header.total_len, 24);
    assert_eq!(packet.frame.len(), 24);
    assert_eq!(packet.payload(), b"abcd");
}

#[tokio::test]
async fn drop_invalid_keep_order() {
    let (_link, ip, remote, _root) = setup();

    let mut ipv6 = datagram(b"v6");
    ipv6[0] = 0x65;

    assert!(remote.inject(datagram(b"first")).await);
    assert!(remote.inject(vec![0x45; 12]).await);
    assert!(remote.inject(ipv6).await);
    assert!(remote.inject(datagram(b"second")).await);

    let first = timeout(WAIT, ip.read()).await.unwrap().unwrap();
    assert_eq!(first.payload(), b"first");
    let second = timeout(WAIT, ip.read()).await.unwrap().unwrap();
    assert_eq!(second.payload(), b"second");
}

#[tokio::test]
async fn forward_unchanged() {
    let (_link, ip, mut remote, _root) = setup();
    let bytes = datagram(b"outbound");

    ip.write(Frame::from(bytes.clone())).await.unwrap();
    let sent = timeout(WAIT, remote.receive()).await.unwrap().unwrap();
    assert_eq!(sent, bytes);
}

#[tokio::test]
async fn link_close_propagates() {
    let (link, ip, _remote, _root) = setup();
    link.close();

    let read = timeout(WAIT, ip.read()).await.expect("read must not block after close");
    assert!(matches!(read, Err(Error::Closed)));
    timeout(WAIT, ip.join()).await.unwrap().unwrap();
    assert!(matches!(ip.write(Frame::from(datagram(b""))).await, Err(Error::Closed)));
}

#[tokio::test]
async fn device_failure_reported() {
    let (link, ip, remote, _root) = setup();
    drop(remote);

    let read = timeout(WAIT, ip.read()).await.unwrap();
    assert!(matches!(read, Err(Error::Closed)));
    let joined = timeout(WAIT, link.join()).await.unwrap();
    assert!(matches!(joined, Err(Error::Device(_))));
}

#[test]
fn parse_rejects() {
    assert_eq!(Packet::parse(Frame::from(vec![0x45; 10])).unwrap_err(),
               crate::wire::Error::TooShort);
    let mut ipv6 = datagram(&[]);
    ipv6[0] = 0x65;
    assert_eq!(Packet::parse(Frame::from(ipv6)).unwrap_err(),
               crate::wire::Error::Unsupported);
}
