//! A tiny http server on a tun interface.
//!
//! Answers every request with a fixed greeting. Create and configure the interface first, for
//! example:
//!
//! ```text
//! ip tuntap add mode tun dev tun0 user $USER
//! ip addr add 10.0.0.1/24 dev tun0
//! ip link set tun0 up
//! ```
//!
//! Then run the example and `curl http://10.0.0.2/` from the host. Every address in the subnet
//! other than the one of the host itself is served.
use structopt::StructOpt;

use tunstack::{Config, Stack};
use tunstack::wire::TcpFlags;

const RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\n\
Content-Type: text/plain\r\n\
Content-Length: 15\r\n\
\r\n\
Hello, World!\r\n";

#[tokio::main]
async fn main() {
    env_logger::init();
    let options = Options::from_args();

    let config = Config {
        name: options.name,
        queue_len: options.queue_len,
        accept_len: options.accept_len,
        ..Config::default()
    };

    let stack = Stack::open(&config)
        .unwrap_or_else(|err| panic!("Couldn't initialize interface {}: {}", config.name, err));
    log::info!("serving on {}", config.name);

    tokio::select! {
        served = serve(&stack) => log::error!("stopped serving: {:?}", served),
        _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
    }

    stack.close();
    if let Err(err) = stack.join().await {
        log::error!("stack failed: {}", err);
    }
}

async fn serve<D: tunstack::nic::Device>(stack: &Stack<D>) -> tunstack::Result<()> {
    loop {
        let connection = stack.accept().await?;
        let request = String::from_utf8_lossy(connection.payload());
        let line = request.lines().next().unwrap_or_default();
        log::info!("{}:{} {}", connection.remote_addr(), connection.remote_port(), line);

        if line.starts_with("GET ") || line.starts_with("HEAD ") {
            stack.write(&connection, TcpFlags::PSH_ACK, RESPONSE).await?;
        }
    }
}

#[derive(StructOpt)]
struct Options {
    /// Name of the tun interface.
    #[structopt(default_value = "tun0")]
    name: String,

    /// Capacity of the queues between the pipeline stages.
    #[structopt(long, default_value = "10")]
    queue_len: usize,

    /// Capacity of the queue of connections waiting to be served.
    #[structopt(long, default_value = "10")]
    accept_len: usize,
}
