//! Tracing subscriber setup.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary and to tests.

use tracing_subscriber::EnvFilter;

/// Development helper: initialize tracing subscriber when `RUST_LOG` is set.
///
/// Tests can call `vantage::dev_tracing::init_tracing()` to see worker and
/// campaign events. This is a no-op when `RUST_LOG` is not set or when a
/// global subscriber is already installed.
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        // Best-effort: try to init a fmt subscriber from env filter.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Install the binary's subscriber.
///
/// Honors `RUST_LOG`, falling back to `default_directive`. Events go to
/// stderr so the viewpoint report on stdout stays clean.
pub fn init_cli_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
