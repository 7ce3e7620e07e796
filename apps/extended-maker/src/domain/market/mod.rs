//! Market and Order Types
//!
//! Core value types shared by the feed supervisor, the metadata cache, and
//! the order strategy. All prices, quantities, and volumes are
//! `rust_decimal::Decimal`; the order path never touches binary floating
//! point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

// =============================================================================
// Order Side
// =============================================================================

/// Side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    /// Bid side; prices at the best bid.
    Buy,
    /// Ask side; prices at the best ask.
    Sell,
}

impl OrderSide {
    /// Venue wire representation of the side.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a side alias is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized order side: {0:?}")]
pub struct ParseOrderSideError(pub String);

impl FromStr for OrderSide {
    type Err = ParseOrderSideError;

    /// Parse the caller-facing side aliases, case-insensitively.
    ///
    /// `"bb"` and `"buy"` mean [`OrderSide::Buy`] (post at the best bid);
    /// `"ba"` and `"sell"` mean [`OrderSide::Sell`] (post at the best ask).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bb" | "buy" => Ok(Self::Buy),
            "ba" | "sell" => Ok(Self::Sell),
            _ => Err(ParseOrderSideError(s.to_string())),
        }
    }
}

// =============================================================================
// Market Quote
// =============================================================================

/// Latest top-of-book snapshot for one market.
///
/// Produced by parsing one push message and replaced wholesale on every
/// accepted message; never mutated in place. Both prices are always
/// present — a message lacking either side's best price is dropped before
/// a quote is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketQuote {
    /// Best bid price.
    pub bid_price: Decimal,
    /// Quantity resting at the best bid (zero when the feed omits it).
    pub bid_qty: Decimal,
    /// Best ask price.
    pub ask_price: Decimal,
    /// Quantity resting at the best ask (zero when the feed omits it).
    pub ask_qty: Decimal,
    /// Feed timestamp in epoch milliseconds; receipt time when the feed
    /// omits it.
    pub observed_at_millis: i64,
}

impl MarketQuote {
    /// Price on the given side of the book.
    #[must_use]
    pub const fn price_for(&self, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => self.bid_price,
            OrderSide::Sell => self.ask_price,
        }
    }
}

// =============================================================================
// Market Metadata
// =============================================================================

/// Venue-defined sizing constraints for a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingRules {
    /// Smallest quantity the venue accepts.
    pub min_order_size: Decimal,
    /// Quantum by which order quantities may vary.
    pub min_order_size_step: Decimal,
}

/// Per-market trading metadata from the venue's bulk market listing.
///
/// Owned by the metadata cache and refreshed in bulk. `last_price` is a
/// REST-sourced statistic for human-readable display only; it never prices
/// an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketMetadata {
    /// Market name, e.g. `"BTC-USD"`.
    pub name: String,
    /// Last traded price, when the venue reports one.
    pub last_price: Option<Decimal>,
    /// 24h volume; `None` when the venue reports none or the adapter could
    /// not parse it.
    pub daily_volume: Option<Decimal>,
    /// Sizing constraints; `None` when the venue omits the trading
    /// configuration for this market.
    pub trading: Option<TradingRules>,
}

// =============================================================================
// Orders
// =============================================================================

/// Venue-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A fully sized order ready for placement.
///
/// Transient: exists for the duration of one strategy invocation and is
/// discarded after the placement call returns or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    /// Target market name.
    pub market: String,
    /// Side of the book to post on.
    pub side: OrderSide,
    /// Limit price.
    pub price: Decimal,
    /// Order quantity in base-asset units.
    pub quantity: Decimal,
}
