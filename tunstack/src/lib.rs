//! A user-space TCP/IP stack on a tun interface.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [The layers](layer/index.html)
//!    1. [Ip](layer/ip/index.html)
//!    1. [Tcp](layer/tcp/index.html)
//! 4. [Network interfaces](nic/index.html)
//! 5. [Queues](storage/index.html)
//!
//! ## Design
//!
//! The stack is a pipeline of three stages, each running two tasks: one carrying packets up and
//! one carrying them down. The [`Link`] reads and writes whole IPv4 datagrams on a device, the ip
//! [`Endpoint`] parses and forwards them and the tcp [`Endpoint`][tcp] runs the connections.
//! Consecutive stages are connected by bounded queues, a slow consumer stalls the stages below it
//! instead of packets getting dropped.
//!
//! Only the passive side of TCP is implemented and that only for well-behaved peers. Connections
//! are opened by the peer, the application sees a connection each time data arrives on it and
//! answers with [`Stack::write`]. There is no retransmission, no reordering and no flow control.
//!
//! ```no_run
//! # async fn serve() -> Result<(), tunstack::Error> {
//! use tunstack::{Config, Stack};
//! use tunstack::wire::TcpFlags;
//!
//! let stack = Stack::open(&Config::default())?;
//! loop {
//!     let connection = stack.accept().await?;
//!     stack.write(&connection, TcpFlags::PSH_ACK, connection.payload()).await?;
//! }
//! # }
//! ```
//!
//! [`Link`]: nic/struct.Link.html
//! [`Endpoint`]: layer/ip/struct.Endpoint.html
//! [tcp]: layer/tcp/struct.Endpoint.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
mod config;
pub mod layer;
pub mod nic;
mod stack;
pub mod storage;
pub mod wire;

pub use self::config::Config;
pub use self::layer::{Error, Result};
pub use self::stack::Stack;
