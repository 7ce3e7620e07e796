//! Infrastructure layer module exports.
//!
//! Adapters for the outside world: the Extended push-feed wire types and
//! stream supervisor, configuration settings, and telemetry setup.

/// Configuration settings loaded from the environment.
pub mod config;

/// Extended orderbook push feed: wire types and stream supervision.
pub mod feed;

/// Tracing subscriber setup.
pub mod telemetry;
