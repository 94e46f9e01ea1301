//! The assembled pipeline.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::layer::{ip, tcp, Result};
use crate::nic::{Device, Link};
use crate::wire::TcpFlags;

/// A device with the ip and tcp stage on top, all running.
///
/// All stages share one root cancellation token. Closing the stack cancels it, a failing device
/// shuts the stages down from the bottom up and is reported by [`join`].
///
/// [`join`]: #method.join
#[derive(Debug)]
pub struct Stack<D> {
    link: Arc<Link<D>>,
    ip: Arc<ip::Endpoint<D>>,
    tcp: Arc<tcp::Endpoint<D>>,
    token: CancellationToken,
}

impl<D: Device> Stack<D> {
    /// Build and start the pipeline on a device.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub fn new(device: D, config: &Config) -> Self {
        let token = CancellationToken::new();
        let link = Arc::new(Link::new(device, config, token.child_token()));
        Stack::with_link(link, config, token)
    }

    fn with_link(link: Arc<Link<D>>, config: &Config, token: CancellationToken) -> Self {
        let ip = Arc::new(ip::Endpoint::new(link.clone(), config, token.child_token()));
        let tcp = Arc::new(tcp::Endpoint::new(ip.clone(), config, token.child_token()));

        link.bind();
        ip.bind();
        tcp.bind();
        net_debug!("stack: running");

        Stack { link, ip, tcp, token }
    }

    /// Wait for the next connection that received data.
    ///
    /// Fails with `Error::Closed` once the stack is shut down.
    pub async fn accept(&self) -> Result<tcp::Connection> {
        self.tcp.accept().await
    }

    /// Send a segment on a connection.
    ///
    /// See [`tcp::Endpoint::write`].
    pub async fn write(&self, connection: &tcp::Connection, flags: TcpFlags, payload: &[u8])
        -> Result<()>
    {
        self.tcp.write(connection, flags, payload).await
    }

    /// A snapshot of the live connection with these ports.
    pub async fn find(&self, ports: tcp::PortPair) -> Option<tcp::Connection> {
        self.tcp.find(ports).await
    }

    /// Shut down all stages, discarding everything queued.
    pub fn close(&self) {
        net_debug!("stack: closing");
        self.token.cancel();
        self.tcp.close();
        self.ip.close();
        self.link.close();
    }

    /// If the stack has been shut down, by [`close`](#method.close) or by a failure.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.link.is_closed()
    }

    /// Wait for all stages to end.
    ///
    /// Reports the first failure, looking at the link before the protocol stages.
    pub async fn join(&self) -> Result<()> {
        let results = [
            self.link.join().await,
            self.ip.join().await,
            self.tcp.join().await,
        ];
        results.into_iter()
            .find(|result| result.is_err())
            .unwrap_or(Ok(()))
    }

    /// The link stage.
    pub fn link(&self) -> &Arc<Link<D>> {
        &self.link
    }

    /// The ip stage.
    pub fn ip(&self) -> &Arc<ip::Endpoint<D>> {
        &self.ip
    }

    /// The tcp stage.
    pub fn tcp(&self) -> &Arc<tcp::Endpoint<D>> {
        &self.tcp
    }
}

#[cfg(target_os = "linux")]
impl Stack<crate::nic::sys::TunInterface> {
    /// Open the configured tun interface and start the pipeline on it.
    ///
    /// Fails with `Error::Device` if the interface can not be opened.
    ///
    /// # Panics
    /// This function panics when called outside of a tokio runtime.
    pub fn open(config: &Config) -> Result<Self> {
        let token = CancellationToken::new();
        let link = Link::open(config, token.child_token())?;
        Ok(Stack::with_link(link, config, token))
    }
}

impl<D> Drop for Stack<D> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
