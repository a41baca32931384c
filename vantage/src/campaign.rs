//! Campaign: accept loop and shutdown for one URL.
//!
//! ```text
//!   LISTENING ──cancel / input closed / listener gone──▶ DRAINING
//!   DRAINING  ──workers joined, connections closed─────▶ STOPPED
//! ```
//!
//! The accept loop waits on the listener and on the cancellation signal at
//! the same time. Each accepted agent is registered and handed to its own
//! fetch worker; the loop never waits on a worker. `shutdown` closes the
//! listener, joins the workers, closes whatever connections remain and
//! freezes the viewpoint store.

use compio::net::{TcpListener, TcpStream};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vantage_core::error::{Result, VantageError};
use vantage_core::options::CampaignOptions;
use vantage_core::tcp::enable_tcp_nodelay;

use crate::locate::{Locator, NullLocator};
use crate::operator::CancelSignal;
use crate::registry::ConnectionRegistry;
use crate::store::{Viewpoint, ViewpointStore};
use crate::worker::{self, FetchJob, WorkerSet};

/// Campaign lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    /// Accepting agents
    Listening,
    /// No longer accepting; workers may still be running
    Draining,
    /// Workers joined, connections closed, store frozen
    Stopped,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Cancelled,
    InputClosed,
}

/// One run of the coordinator against a single URL.
pub struct Campaign {
    url: Arc<str>,
    options: CampaignOptions,
    locator: Arc<dyn Locator>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    connections: Arc<ConnectionRegistry>,
    workers: WorkerSet,
    store: Arc<ViewpointStore>,
    state: CampaignState,
}

impl Campaign {
    /// Listen on `addr` with default options and no geolocation.
    pub async fn bind(addr: SocketAddr, url: impl Into<Arc<str>>) -> Result<Self> {
        Self::bind_with(addr, url, CampaignOptions::default(), Arc::new(NullLocator)).await
    }

    /// Listen on `addr`.
    ///
    /// Failure to set up the listener is fatal for the campaign; there is no
    /// partial-service mode.
    pub async fn bind_with(
        addr: SocketAddr,
        url: impl Into<Arc<str>>,
        options: CampaignOptions,
        locator: Arc<dyn Locator>,
    ) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "campaign url is empty").into());
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| VantageError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| VantageError::Bind { addr, source })?;
        info!("[Campaign] listening on {} for {}", local_addr, url);

        Ok(Self {
            url,
            options,
            locator,
            listener: Some(listener),
            local_addr,
            connections: Arc::new(ConnectionRegistry::new()),
            workers: WorkerSet::new(),
            store: Arc::new(ViewpointStore::new()),
            state: CampaignState::Listening,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Address the listener is bound to (resolves port 0).
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub const fn state(&self) -> CampaignState {
        self.state
    }

    pub fn store(&self) -> Arc<ViewpointStore> {
        self.store.clone()
    }

    pub fn connections(&self) -> Arc<ConnectionRegistry> {
        self.connections.clone()
    }

    /// Workers dispatched and not yet joined.
    pub fn pending_workers(&self) -> usize {
        self.workers.len()
    }

    /// Accept agents until `cancel` fires or disconnects.
    ///
    /// Cancellation only stops accepting; workers already dispatched keep
    /// running until [`shutdown`](Self::shutdown) joins them. Returns the
    /// resulting state (`Draining`, or `Stopped` if already shut down).
    pub async fn run(&mut self, cancel: CancelSignal) -> CampaignState {
        use futures::{select, FutureExt};

        if self.state != CampaignState::Listening {
            return self.state;
        }
        let Some(listener) = self.listener.as_ref() else {
            self.state = CampaignState::Draining;
            return self.state;
        };

        loop {
            let event = select! {
                res = listener.accept().fuse() => Event::Accepted(res),
                msg = cancel.recv_async().fuse() => match msg {
                    Ok(()) => Event::Cancelled,
                    Err(_) => Event::InputClosed,
                },
            };

            match event {
                Event::Accepted(Ok((stream, peer))) => self.admit(stream, peer),
                Event::Accepted(Err(e)) if listener_gone(&e) => {
                    error!("[Campaign] listener failed: {}", e);
                    break;
                }
                Event::Accepted(Err(e)) => warn!("[Campaign] accept failed: {}", e),
                Event::Cancelled => {
                    info!("[Campaign] cancelled; no longer accepting agents");
                    break;
                }
                Event::InputClosed => {
                    info!("[Campaign] operator input closed; no longer accepting agents");
                    break;
                }
            }
        }

        self.state = CampaignState::Draining;
        self.state
    }

    /// Register one accepted agent and dispatch its worker.
    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if self.options.tcp_nodelay {
            if let Err(e) = enable_tcp_nodelay(&stream) {
                debug!("[Campaign] TCP_NODELAY on {} failed: {}", peer, e);
            }
        }

        let conn = match self
            .connections
            .register(&peer.ip().to_string(), peer.port(), stream)
        {
            Ok(conn) => conn,
            Err(e) => {
                warn!("[Campaign] rejected agent {}: {}", peer, e);
                return;
            }
        };
        info!("[Campaign] connection to {} established", conn.addr());

        let id = conn.id();
        let job = FetchJob {
            conn,
            url: self.url.clone(),
            store: self.store.clone(),
            registry: self.connections.clone(),
            locator: self.locator.clone(),
            options: self.options.clone(),
        };

        match worker::dispatch(job) {
            Ok(handle) => {
                info!(
                    "[Campaign] created worker {} to get {} from {}",
                    handle.id(),
                    self.url,
                    handle.peer()
                );
                self.workers.push(handle);
            }
            Err(e) => {
                error!("[Campaign] failed to start worker {}: {}", id, e);
                self.connections.release(id);
            }
        }
    }

    /// Stop accepting, join workers, close connections, freeze the store.
    ///
    /// Returns the final viewpoints in completion order. Calling it again
    /// returns the same records and does nothing else.
    pub async fn shutdown(&mut self) -> Vec<Viewpoint> {
        if self.state == CampaignState::Stopped {
            return self.store.snapshot();
        }
        self.state = CampaignState::Draining;

        if self.listener.take().is_some() {
            debug!("[Campaign] listener on {} closed", self.local_addr);
        }

        let deadline = self.options.drain_timeout.map(|d| Instant::now() + d);
        let (mut joined, mut detached) = (0usize, 0usize);
        loop {
            let batch = self.workers.take_all();
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if handle.join(deadline).await {
                    joined += 1;
                } else {
                    detached += 1;
                }
            }
        }

        let closed = self.connections.close_all();
        self.store.freeze();
        self.state = CampaignState::Stopped;

        info!(
            "[Campaign] stopped: {} viewpoints, {} workers joined, {} detached, {} connections closed",
            self.store.len(),
            joined,
            detached,
            closed
        );
        self.store.snapshot()
    }
}

/// Accept errors that mean the listening socket itself is unusable.
fn listener_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported
    )
}
