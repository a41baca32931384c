//! Viewpoint records and the store workers append them to.

use bytes::Bytes;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// One agent's capture of the campaign URL.
///
/// Immutable once built; cloning is cheap (shared URL and page buffers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewpoint {
    url: Arc<str>,
    agent: Ipv4Addr,
    location: String,
    page: Bytes,
}

impl Viewpoint {
    pub fn new(url: Arc<str>, agent: Ipv4Addr, location: impl Into<String>, page: Bytes) -> Self {
        Self {
            url,
            agent,
            location: location.into(),
            page,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub const fn agent(&self) -> Ipv4Addr {
        self.agent
    }

    /// Human-readable location, empty when the lookup found nothing.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn page(&self) -> &Bytes {
        &self.page
    }
}

#[derive(Debug, Default)]
struct Records {
    list: Vec<Viewpoint>,
    frozen: bool,
}

/// Append-only collection of completed viewpoints.
///
/// Order is completion order. Once frozen, appends are refused so the
/// records handed to the caller after shutdown cannot change.
#[derive(Debug, Default)]
pub struct ViewpointStore {
    records: Mutex<Records>,
}

impl ViewpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a viewpoint. Returns `false` if the store is already frozen.
    pub fn push(&self, viewpoint: Viewpoint) -> bool {
        let mut records = self.records.lock();
        if records.frozen {
            return false;
        }
        records.list.push(viewpoint);
        true
    }

    pub fn freeze(&self) {
        self.records.lock().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.records.lock().frozen
    }

    pub fn len(&self) -> usize {
        self.records.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current records, in completion order.
    pub fn snapshot(&self) -> Vec<Viewpoint> {
        self.records.lock().list.clone()
    }
}

/// Write the final report: a header line per viewpoint followed by its raw page.
pub fn write_report<W: Write>(out: &mut W, viewpoints: &[Viewpoint]) -> io::Result<()> {
    for vpt in viewpoints {
        writeln!(out, "view from {} at {}", vpt.location(), vpt.agent())?;
        out.write_all(vpt.page())?;
        out.write_all(b"\n")?;
    }
    out.flush()
}
