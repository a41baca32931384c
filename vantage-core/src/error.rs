/// Vantage Error Types
///
/// Every failure a campaign can hit, from listener setup down to a single
/// peer sending a broken frame.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Vantage operations
#[derive(Error, Debug)]
pub enum VantageError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Framing violation: missing or unparsable header, oversized frame,
    /// or a stream that ended before the declared length arrived
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Peer address is not a dotted IPv4 quad or the port is zero
    #[error("Invalid peer address {addr}:{port}")]
    InvalidAddress { addr: String, port: u16 },

    /// Any failure while servicing one agent
    #[error("{source}: failed to get viewpoint for {url} from {peer}")]
    Viewpoint {
        url: String,
        peer: String,
        #[source]
        source: Box<VantageError>,
    },

    /// Listener could not be set up
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A bounded I/O step did not finish in time
    #[error("{op} timed out after {after:?}")]
    TimedOut { op: &'static str, after: Duration },
}

/// Result type alias for Vantage operations
pub type Result<T> = std::result::Result<T, VantageError>;

impl VantageError {
    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(addr: impl Into<String>, port: u16) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            port,
        }
    }

    /// Wrap a per-peer failure with the campaign URL and the peer address.
    pub fn viewpoint(url: impl Into<String>, peer: impl ToString, source: VantageError) -> Self {
        Self::Viewpoint {
            url: url.into(),
            peer: peer.to_string(),
            source: Box::new(source),
        }
    }

    /// Check if this error (or the failure it wraps) is a framing violation
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        match self {
            Self::Protocol(_) => true,
            Self::Viewpoint { source, .. } => source.is_protocol(),
            _ => false,
        }
    }

    /// Check if this error (or the failure it wraps) is an elapsed timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::TimedOut { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            Self::Viewpoint { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error means the peer went away
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::WriteZero
            ),
            Self::Viewpoint { source, .. } => source.is_connection_error(),
            _ => false,
        }
    }
}
