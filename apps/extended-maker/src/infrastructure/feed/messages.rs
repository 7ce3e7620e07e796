//! Extended Feed Message Types
//!
//! Wire format types for deserializing messages from the Extended
//! exchange's per-market orderbook stream, subscribed at top-of-book depth
//! (`?depth=1`).
//!
//! # Message Types
//!
//! Every message is an envelope with a `type` discriminator. Only full
//! `SNAPSHOT` messages are processed; anything else is ignored. At depth 1
//! the feed replaces the book on every message, so each accepted snapshot
//! yields a complete top-of-book quote.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "type": "SNAPSHOT",
//!   "ts": 1717171717000,
//!   "data": {
//!     "m": "BTC-USD",
//!     "b": [{"p": "65100.5", "q": "0.42"}],
//!     "a": [{"p": "65101.0", "q": "1.10"}]
//!   }
//! }
//! ```
//!
//! Prices and quantities arrive as decimal strings; level quantities are
//! optional and default to zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::MarketQuote;

/// Message type discriminator for the orderbook stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedMessageType {
    /// Full book replacement; the only type consumed at depth 1.
    Snapshot,
    /// Incremental update; sent on deeper subscriptions, ignored here.
    Delta,
    /// Any discriminator this build does not recognize.
    #[serde(other)]
    Unknown,
}

/// Envelope wrapping every message on the orderbook stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub message_type: FeedMessageType,

    /// Orderbook payload; absent on non-book messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OrderbookSnapshot>,

    /// Venue timestamp in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

/// One orderbook snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    /// Market identifier, e.g. `"BTC-USD"`.
    #[serde(rename = "m")]
    pub market: String,

    /// Bid levels, best first. Only the first level is consumed.
    #[serde(rename = "b", default)]
    pub bids: Vec<PriceLevel>,

    /// Ask levels, best first. Only the first level is consumed.
    #[serde(rename = "a", default)]
    pub asks: Vec<PriceLevel>,
}

impl OrderbookSnapshot {
    /// Build a [`MarketQuote`] from the best level of each side.
    ///
    /// Returns `None` when either side has no level or no price — such
    /// snapshots are dropped, never stored, so a cached quote always
    /// carries both sides.
    #[must_use]
    pub fn best_quote(&self, observed_at_millis: i64) -> Option<MarketQuote> {
        let bid = self.bids.first()?;
        let ask = self.asks.first()?;
        Some(MarketQuote {
            bid_price: bid.price?,
            bid_qty: bid.qty.unwrap_or_default(),
            ask_price: ask.price?,
            ask_qty: ask.qty.unwrap_or_default(),
            observed_at_millis,
        })
    }
}

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Quantity resting at the level.
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<Decimal>,
}
