//! TCP socket helpers for agent connections.
//!
//! compio streams do not expose every socket option, so these helpers
//! borrow the raw descriptor through `socket2` for the duration of a single
//! call.
//!
//! # Safety
//!
//! The borrowed `socket2::Socket` is always forgotten before returning, so
//! the descriptor stays owned by the compio stream.

#![allow(unsafe_code)]

use std::io;
use std::net::Shutdown;

/// Run `f` against a `socket2` view of the stream's descriptor.
fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = f(&sock);
        std::mem::forget(sock); // Don't close the fd
        result
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        let result = f(&sock);
        std::mem::forget(sock); // Don't close the socket
        result
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (stream, f);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw socket access is not supported on this platform",
        ))
    }
}

/// Enable TCP_NODELAY so the single URL frame leaves immediately.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    with_socket(stream, |sock| sock.set_nodelay(true))
}

/// Shut down both directions of the stream.
///
/// Any reader blocked on the stream, on any thread, wakes with EOF. The
/// descriptor itself is released when the last owner drops the stream.
///
/// A peer that already disconnected reports `NotConnected`; that is not
/// treated as an error since the socket is down either way.
pub fn shutdown_stream(stream: &compio::net::TcpStream) -> io::Result<()> {
    match with_socket(stream, |sock| sock.shutdown(Shutdown::Both)) {
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}
