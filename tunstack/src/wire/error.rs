use core::fmt;

/// The error type for parsing headers off the wire.
///
/// None of these are fatal to the stack. The stage that detects one drops the offending frame and
/// continues with the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming packet was shorter than its fixed header.
    ///
    /// Both the IPv4 and the TCP header require at least 20 octets. This is also returned when a
    /// header announces a length that extends past the received data.
    TooShort,

    /// An incoming packet was recognized but was self-contradictory.
    ///
    /// Examples: an IPv4 header length below five words, a TCP data offset pointing into the
    /// fixed header.
    Malformed,

    /// The packet is well-formed but of a kind this stack does not handle.
    ///
    /// Such as IPv6 traffic on the tun device or a datagram for a protocol other than TCP.
    Unsupported,
}

/// The result type for the wire codecs.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TooShort    => write!(f, "truncated packet"),
            Error::Malformed   => write!(f, "malformed packet"),
            Error::Unsupported => write!(f, "unsupported packet"),
        }
    }
}

impl std::error::Error for Error {}
