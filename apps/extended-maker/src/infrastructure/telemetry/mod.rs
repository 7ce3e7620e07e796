//! Tracing Setup
//!
//! Installs a `tracing-subscriber` fmt layer with `EnvFilter`. The host
//! process decides when (and whether) to call this — the library itself
//! only emits `tracing` events.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `info`)
//!
//! # Usage
//!
//! ```ignore
//! extended_maker::infrastructure::telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber.
///
/// Idempotent: a second call (or a subscriber installed elsewhere, e.g. by
/// a test harness) is left in place untouched.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
