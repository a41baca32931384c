//! # Vantage
//!
//! Collect "viewpoints" of one URL: remote fetcher agents connect to the
//! coordinator, receive the URL, fetch it from wherever they are and send
//! the page back. The coordinator tags each page with the agent's address
//! and location and keeps the results for comparison.
//!
//! ## Architecture
//!
//! - **`vantage-core`**: error taxonomy, campaign options, socket helpers
//! - **`vantage-vpts`**: the `vpts{length=N}vpts` wire codec
//! - **`vantage`**: campaign, registry, workers, store (this crate)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vantage::{cancel_channel, spawn_stdin_watcher, write_report, Campaign};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut campaign = Campaign::bind("0.0.0.0:9000".parse()?, "http://example.test/").await?;
//!
//! // Typing `q` on stdin stops accepting agents
//! let (canceller, cancel) = cancel_channel();
//! spawn_stdin_watcher(canceller)?;
//! campaign.run(cancel).await;
//!
//! let viewpoints = campaign.shutdown().await;
//! write_report(&mut std::io::stdout(), &viewpoints)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! - One thread with its own compio runtime per agent; workers run in parallel
//! - Registry, worker set and store each sit behind their own lock; no
//!   operation holds two, and no lock is held across I/O
//! - Per-agent failures end that agent's exchange only

#![warn(clippy::all)]

pub mod campaign;
pub mod dev_tracing;
pub mod locate;
pub mod operator;
pub mod registry;
pub mod store;
pub mod worker;

pub use bytes::Bytes;
pub use campaign::{Campaign, CampaignState};
pub use locate::{GeoPluginLocator, Location, Locator, NullLocator};
pub use operator::{cancel_channel, spawn_stdin_watcher, CancelSignal, Canceller};
pub use registry::{Connection, ConnectionHandle, ConnectionRegistry};
pub use store::{write_report, Viewpoint, ViewpointStore};
pub use vantage_core::error::{Result, VantageError};
pub use vantage_core::options::CampaignOptions;

/// Wire codec, for agents and tools that speak the protocol.
pub use vantage_vpts as vpts;
