#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Extended Maker - Best-Quote Streaming & Order Placement
//!
//! Streams real-time top-of-book quotes for a configurable set of markets
//! from the Extended exchange push feed, caches the latest snapshot per
//! market, and sizes post-only limit orders at the cached best bid/ask.
//! The caller (a CLI or any host process) drives stream start/stop and
//! strategy execution; REST transport, signing, and authentication live
//! behind the [`ExchangeApi`] port and are never implemented here.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `market`: quotes, metadata, sides, order intents
//!   - `snapshot`: latest-quote-per-market store
//!
//! - **Application**: Ports and the services built on them
//!   - `ports`: venue client and quote-source capability interfaces
//!   - `metadata`: TTL cache over the venue's bulk market listing
//!   - `strategy`: best-price order sizing and placement
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: push-feed wire types and the per-market stream supervisor
//!   - `config`: environment-backed settings
//!   - `telemetry`: tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//! orderbook WS (per market) ──► MarketStreamSupervisor ──► SnapshotStore
//!                                                               │
//! venue REST (bulk markets) ──► MetadataCache ──► BestPriceStrategy
//!                                                               │
//!                                              ExchangeApi::place_order
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{
    MarketMetadata, MarketQuote, OrderId, OrderIntent, OrderSide, ParseOrderSideError,
    TradingRules,
};
pub use domain::snapshot::SnapshotStore;

// Ports and services
pub use application::metadata::MetadataCache;
pub use application::ports::{ExchangeApi, ExchangeApiError, QuoteSource};
pub use application::strategy::{BestPriceStrategy, OrderStrategy, StrategyError};

// Infrastructure
pub use infrastructure::config::{CacheSettings, ConfigError, EngineConfig, FeedSettings};
pub use infrastructure::feed::{
    FeedMessage, FeedMessageType, MarketStreamSupervisor, OrderbookSnapshot, PriceLevel,
};
pub use infrastructure::telemetry::init as init_telemetry;
