//! Extended Orderbook Push Feed
//!
//! Wire types for the per-market orderbook stream and the supervisor that
//! keeps one connection alive per active market.

pub mod messages;
pub mod supervisor;

pub use messages::{FeedMessage, FeedMessageType, OrderbookSnapshot, PriceLevel};
pub use supervisor::MarketStreamSupervisor;
