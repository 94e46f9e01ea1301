/// Sizing and naming of a stack instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Name of the tun interface to create or attach to.
    pub name: String,

    /// Capacity of each queue between two pipeline tasks.
    pub queue_len: usize,

    /// Capacity of the queue of connections waiting in `accept`.
    pub accept_len: usize,

    /// Size of the buffer each frame is read into.
    ///
    /// Longer datagrams on the device are truncated to this length.
    pub frame_len: usize,
}

impl Config {
    /// The default interface name.
    pub const DEFAULT_NAME: &'static str = "tun0";

    /// The default capacity of all queues.
    pub const DEFAULT_QUEUE_LEN: usize = 10;

    /// The default size of frame buffers.
    pub const DEFAULT_FRAME_LEN: usize = 2048;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: Config::DEFAULT_NAME.to_owned(),
            queue_len: Config::DEFAULT_QUEUE_LEN,
            accept_len: Config::DEFAULT_QUEUE_LEN,
            frame_len: Config::DEFAULT_FRAME_LEN,
        }
    }
}
