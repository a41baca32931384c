//! Vantage Core
//!
//! Runtime-level building blocks shared by the codec and the coordinator:
//! - Error taxonomy (`error`)
//! - Campaign options (`options`)
//! - TCP socket helpers (`tcp`)
//! - Timeout wrappers for agent I/O (`timeout`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
pub mod error;
pub mod options;
pub mod tcp;
pub mod timeout;

pub mod prelude {
    pub use crate::error::{Result, VantageError};
    pub use crate::options::CampaignOptions;
    pub use crate::tcp::{enable_tcp_nodelay, shutdown_stream};
    pub use crate::timeout::with_timeout;
}
