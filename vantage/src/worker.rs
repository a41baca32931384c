//! Fetch workers.
//!
//! One worker per accepted agent. Each runs on its own thread with its own
//! compio runtime, so workers proceed in parallel and a slow agent or a slow
//! location lookup never holds up another.
//!
//! ```text
//! Campaign (accept loop)            Worker thread (compio runtime)
//! ┌────────────────────┐  dispatch  ┌───────────────────────────────┐
//! │ accept → register  │───────────▶│ send url → recv page → locate │
//! │ WorkerSet.push     │            │ → store.push                  │
//! └────────────────────┘◀─ done ────└───────────────────────────────┘
//! ```

use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vantage_core::error::{Result, VantageError};
use vantage_core::options::CampaignOptions;
use vantage_core::timeout::{wait_until, with_timeout};
use vantage_vpts::{read_frame, write_frame};

use crate::locate::Locator;
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::store::{Viewpoint, ViewpointStore};

/// Everything one worker needs to service one agent.
pub(crate) struct FetchJob {
    pub conn: ConnectionHandle,
    pub url: Arc<str>,
    pub store: Arc<ViewpointStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub locator: Arc<dyn Locator>,
    pub options: CampaignOptions,
}

impl FetchJob {
    async fn run(self) {
        let id = self.conn.id();
        match self.fetch().await {
            Ok(vpt) => {
                let len = vpt.page().len();
                let agent = vpt.agent();
                if self.store.push(vpt) {
                    info!(
                        "[Worker {}] got viewpoint for {} ({} bytes) from {}",
                        id, self.url, len, agent
                    );
                } else {
                    warn!(
                        "[Worker {}] viewpoint from {} arrived after shutdown; discarded",
                        id, agent
                    );
                }
            }
            Err(e) if e.is_connection_error() => {
                warn!("[Worker {}] agent {} hung up: {}", id, self.conn.addr(), e);
                self.registry.release(id);
            }
            Err(e) => {
                warn!("[Worker {}] {}", id, e);
                self.registry.release(id);
            }
        }
    }

    async fn fetch(&self) -> Result<Viewpoint> {
        let addr = self.conn.addr();
        let page = self
            .exchange()
            .await
            .map_err(|e| VantageError::viewpoint(&*self.url, addr, e))?;

        let location = self.locator.locate(addr).to_string();
        Ok(Viewpoint::new(self.url.clone(), addr, location, page))
    }

    /// Send the URL frame, then read the page frame.
    async fn exchange(&self) -> Result<Bytes> {
        let mut stream = self.conn.stream();

        let sent = with_timeout(
            self.options.send_timeout,
            "send url",
            write_frame(&mut stream, self.url.as_bytes()),
        )
        .await?;
        debug!("[Worker {}] sent {} byte url frame", self.conn.id(), sent);

        with_timeout(
            self.options.recv_timeout,
            "receive page",
            read_frame(
                &mut stream,
                self.options.read_chunk_size,
                self.options.max_frame_len,
            ),
        )
        .await
    }
}

/// Handle to a dispatched worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: ConnectionId,
    peer: Ipv4Addr,
    thread: JoinHandle<()>,
    done: flume::Receiver<()>,
}

impl WorkerHandle {
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    pub const fn peer(&self) -> Ipv4Addr {
        self.peer
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_disconnected()
    }

    /// Wait for the worker to finish, up to `deadline`.
    ///
    /// Returns `false` if the deadline passed first; the worker thread is
    /// then detached and keeps running until its socket fails.
    pub async fn join(self, deadline: Option<Instant>) -> bool {
        // the sender is only ever dropped, so completion shows up as Disconnected
        let finished = self.is_finished()
            || match wait_until(deadline, self.done.recv_async()).await {
                Ok(done) => done.is_some(),
                Err(e) => {
                    warn!("[Worker {}] cannot arm drain deadline: {}", self.id, e);
                    false
                }
            };

        if !finished {
            warn!(
                "[Worker {}] still servicing {} at drain deadline; detaching",
                self.id, self.peer
            );
            return false;
        }

        if self.thread.join().is_err() {
            error!("[Worker {}] panicked while servicing {}", self.id, self.peer);
        }
        true
    }
}

/// Start a worker thread for `job`.
pub(crate) fn dispatch(job: FetchJob) -> io::Result<WorkerHandle> {
    let id = job.conn.id();
    let peer = job.conn.addr();
    let (done_tx, done_rx) = flume::bounded::<()>(0);

    let thread = thread::Builder::new()
        .name(format!("vantage-worker-{id}"))
        .spawn(move || {
            let _done = done_tx;
            worker_thread(job);
        })?;

    Ok(WorkerHandle {
        id,
        peer,
        thread,
        done: done_rx,
    })
}

fn worker_thread(job: FetchJob) {
    let id = job.conn.id();
    debug!("[Worker {}] starting for {}", id, job.conn);

    let rt = match compio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("[Worker {}] failed to create runtime: {}", id, e);
            job.registry.release(id);
            return;
        }
    };

    rt.block_on(job.run());
    debug!("[Worker {}] stopped", id);
}

/// Handles of dispatched workers.
#[derive(Debug, Default)]
pub struct WorkerSet {
    handles: Mutex<Vec<WorkerHandle>>,
}

impl WorkerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: WorkerHandle) {
        self.handles.lock().push(handle);
    }

    /// Remove and return every handle currently in the set.
    pub fn take_all(&self) -> Vec<WorkerHandle> {
        std::mem::take(&mut *self.handles.lock())
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
