//! Campaign configuration options
//!
//! Tuning knobs for one viewpoint campaign: how the coordinator reads frames
//! and how long it is willing to wait on agents.

use std::time::Duration;

/// Default chunk size for reads from an agent socket.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default bound on receiving one page frame.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound on sending the URL frame.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on waiting for in-flight workers during shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Campaign configuration options.
///
/// # Examples
///
/// ```
/// use vantage_core::options::CampaignOptions;
/// use std::time::Duration;
///
/// let opts = CampaignOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_max_frame_len(1 << 20);
/// ```
#[derive(Debug, Clone)]
pub struct CampaignOptions {
    /// Size of each read from an agent socket.
    pub read_chunk_size: usize,

    /// Maximum time to wait for an agent's page frame.
    /// - `None`: Block indefinitely
    /// - `Some(duration)`: Fail the exchange after duration
    pub recv_timeout: Option<Duration>,

    /// Maximum time to wait for the URL frame to be accepted by the socket.
    /// - `None`: Block indefinitely
    pub send_timeout: Option<Duration>,

    /// Maximum time shutdown waits for dispatched workers.
    /// - `None`: Wait for every worker to finish
    /// - `Some(duration)`: Detach workers still running after duration
    pub drain_timeout: Option<Duration>,

    /// Largest page an agent may declare.
    /// - `None`: No limit (default)
    pub max_frame_len: Option<usize>,

    /// Disable Nagle's algorithm on accepted agent sockets.
    pub tcp_nodelay: bool,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            recv_timeout: Some(DEFAULT_RECV_TIMEOUT),
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
            drain_timeout: Some(DEFAULT_DRAIN_TIMEOUT),
            max_frame_len: None,
            tcp_nodelay: true,
        }
    }
}

impl CampaignOptions {
    /// Options with every wait unbounded.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            drain_timeout: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = Some(max);
        self
    }

    #[must_use]
    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
