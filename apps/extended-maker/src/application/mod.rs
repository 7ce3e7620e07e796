//! Application layer module exports.
//!
//! Port definitions for external collaborators plus the services built on
//! them: the TTL metadata cache and the best-price order strategy.

/// TTL cache over the venue's bulk market metadata.
pub mod metadata;

/// Capability interfaces for external collaborators.
pub mod ports;

/// Order sizing and placement strategies.
pub mod strategy;
