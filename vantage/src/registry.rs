//! Connection registry
//!
//! Bookkeeping for every accepted agent socket. Each connection is closed
//! exactly once: by its worker's error path (`release`) or by shutdown
//! (`close_all`). Both remove the entry under the lock before closing it,
//! so a second close through the registry can only be a bug.

use compio::net::TcpStream;
use parking_lot::Mutex;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use vantage_core::error::{Result, VantageError};
use vantage_core::tcp::shutdown_stream;

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// Shared handle to a registered connection
pub type ConnectionHandle = Arc<Connection>;

/// One accepted agent socket.
pub struct Connection {
    id: ConnectionId,
    addr: Ipv4Addr,
    port: u16,
    stream: TcpStream,
    closed: AtomicBool,
}

impl Connection {
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The agent socket. Workers drive I/O through the shared reference.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// True until the stream has been closed.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Shut the socket down. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(e) = shutdown_stream(&self.stream) {
            debug!("[Registry] shutdown of {} failed: {}", self, e);
        }
        true
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}:{}", self.id, self.addr, self.port)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Registered agent connections, in acceptance order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: Mutex<Vec<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the peer and take ownership of its stream.
    ///
    /// `addr` must be a dotted quad of four decimal octets and `port` must
    /// be non-zero; otherwise the stream is dropped and
    /// `VantageError::InvalidAddress` is returned.
    pub fn register(&self, addr: &str, port: u16, stream: TcpStream) -> Result<ConnectionHandle> {
        let ip = parse_peer(addr, port)?;
        let conn = Arc::new(Connection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            addr: ip,
            port,
            stream,
            closed: AtomicBool::new(false),
        });

        self.conns.lock().push(conn.clone());
        trace!("[Registry] registered {}", conn);
        Ok(conn)
    }

    /// Remove one connection and close it.
    ///
    /// Returns `false` if it was no longer registered (already closed by
    /// shutdown).
    pub fn release(&self, id: ConnectionId) -> bool {
        let mut conns = self.conns.lock();
        let Some(pos) = conns.iter().position(|c| c.id == id) else {
            return false;
        };
        let conn = conns.remove(pos);
        assert!(conn.close(), "connection {conn} closed twice");
        trace!("[Registry] released {}", conn);
        true
    }

    /// Close and remove every registered connection. Returns how many.
    pub fn close_all(&self) -> usize {
        let mut conns = self.conns.lock();
        let drained: Vec<ConnectionHandle> = conns.drain(..).collect();
        for conn in &drained {
            assert!(conn.close(), "connection {conn} closed twice");
        }
        debug!("[Registry] closed {} connections", drained.len());
        drained.len()
    }

    /// Liveness of a handle returned by [`register`](Self::register).
    pub fn is_connected(handle: &Connection) -> bool {
        handle.is_connected()
    }

    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_peer(addr: &str, port: u16) -> Result<Ipv4Addr> {
    if port == 0 || addr.split('.').count() != 4 {
        return Err(VantageError::invalid_address(addr, port));
    }
    addr.parse()
        .map_err(|_| VantageError::invalid_address(addr, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compio::net::TcpListener;

    /// Accepted end of a fresh loopback connection plus the client end,
    /// which must be kept alive for the duration of the test.
    async fn loopback_pair() -> (TcpStream, std::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || std::net::TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().await.unwrap();
        (server, client.join().unwrap())
    }

    #[compio::test]
    async fn rejects_malformed_peers() {
        let registry = ConnectionRegistry::new();

        let (stream, _client) = loopback_pair().await;
        let err = registry.register("1.2.3", 80, stream).unwrap_err();
        assert!(matches!(err, VantageError::InvalidAddress { .. }));

        let (stream, _client) = loopback_pair().await;
        let err = registry.register("1.2.3.4", 0, stream).unwrap_err();
        assert!(matches!(err, VantageError::InvalidAddress { port: 0, .. }));

        let (stream, _client) = loopback_pair().await;
        assert!(registry.register("1.2.3.999", 80, stream).is_err());

        let (stream, _client) = loopback_pair().await;
        assert!(registry.register("::1", 80, stream).is_err());

        assert!(registry.is_empty());
    }

    #[compio::test]
    async fn register_release_close_all() {
        let registry = ConnectionRegistry::new();

        let (stream, _a) = loopback_pair().await;
        let first = registry.register("1.2.3.4", 80, stream).unwrap();
        let (stream, _b) = loopback_pair().await;
        let second = registry.register("127.0.0.1", 4000, stream).unwrap();

        assert_eq!(registry.len(), 2);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.addr(), Ipv4Addr::new(1, 2, 3, 4));
        assert!(ConnectionRegistry::is_connected(&first));

        assert!(registry.release(first.id()));
        assert!(!first.is_connected());
        // already gone; nothing to close again
        assert!(!registry.release(first.id()));

        assert_eq!(registry.close_all(), 1);
        assert!(!second.is_connected());
        assert!(registry.is_empty());
        assert_eq!(registry.close_all(), 0);
    }

    #[compio::test]
    async fn close_is_idempotent_on_the_handle() {
        let registry = ConnectionRegistry::new();
        let (stream, _client) = loopback_pair().await;
        let conn = registry.register("10.1.1.1", 9000, stream).unwrap();

        assert!(conn.close());
        assert!(!conn.close());
        assert!(!conn.is_connected());
    }
}
