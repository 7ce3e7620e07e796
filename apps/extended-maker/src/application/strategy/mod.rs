//! Order Strategies
//!
//! The `OrderStrategy` capability interface plus its one implementation,
//! `BestPriceStrategy`: size an order from a USD notional and post it at
//! the live best bid/ask. Additional strategies slot in as alternative
//! implementations without changing callers.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::application::metadata::MetadataCache;
use crate::application::ports::{ExchangeApi, ExchangeApiError, QuoteSource};
use crate::domain::market::{OrderId, OrderIntent, OrderSide, TradingRules};

// =============================================================================
// Error Type
// =============================================================================

/// Categorized outcome of a failed strategy invocation.
///
/// Every failure is surfaced to the caller as one of these kinds; a
/// strategy call never crashes the process and never retries.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// No trading metadata (or no sizing constraints) for the market.
    #[error("trading configuration unavailable for {market}")]
    ConfigurationUnavailable {
        /// Market that lacked metadata.
        market: String,
    },

    /// No live quote cached for the market, or the cached price cannot
    /// size an order.
    #[error("no live quote available for {market}")]
    QuoteUnavailable {
        /// Market that lacked a usable quote.
        market: String,
    },

    /// The side argument matched none of the recognized aliases.
    #[error("unrecognized order side: {side:?}")]
    InvalidSide {
        /// The rejected side value.
        side: String,
    },

    /// The sized quantity came out below the venue minimum. Hard reject;
    /// the quantity is never rounded up to the minimum.
    #[error("quantity {quantity} is below the minimum order size {minimum}")]
    BelowMinimumSize {
        /// Quantity the notional produced.
        quantity: Decimal,
        /// Venue minimum order size.
        minimum: Decimal,
    },

    /// The venue rejected the order for exceeding the available balance.
    #[error("insufficient balance to place the order")]
    InsufficientBalance,

    /// The venue rejected the order's quantity precision.
    #[error("venue rejected quantity precision for {quantity}")]
    QuantityPrecision {
        /// Quantity the venue rejected.
        quantity: Decimal,
    },

    /// Any other placement failure, carrying the venue's message.
    #[error("order placement failed: {0}")]
    Execution(#[source] ExchangeApiError),
}

// =============================================================================
// Capability Interface
// =============================================================================

/// An order-placement strategy over `(market, side, notional)`.
#[async_trait]
pub trait OrderStrategy: Send + Sync {
    /// Size and place one order worth `notional_usd` on `market`.
    ///
    /// `side` accepts the aliases `"bb"`/`"buy"` and `"ba"`/`"sell"`,
    /// case-insensitively. Returns the venue-assigned order id, or a
    /// categorized failure. A failed placement is terminal for the
    /// invocation — no retry is attempted.
    async fn execute(
        &self,
        market: &str,
        side: &str,
        notional_usd: Decimal,
    ) -> Result<OrderId, StrategyError>;
}

// =============================================================================
// Best-Price Strategy
// =============================================================================

/// Posts limit orders at the cached best bid/ask.
///
/// Prices come exclusively from the live quote cache — never from the
/// slower REST-sourced `last_price`, which is display-only. Orders are
/// always placed post-only: the strategy posts at the observed best price
/// on its own side, so it never intends to cross the spread, though the
/// venue may still reject if the book moved.
pub struct BestPriceStrategy {
    exchange: Arc<dyn ExchangeApi>,
    metadata: Arc<MetadataCache>,
    quotes: Arc<dyn QuoteSource>,
}

impl BestPriceStrategy {
    /// Create a strategy over the venue client, metadata cache, and live
    /// quote source.
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        metadata: Arc<MetadataCache>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        Self {
            exchange,
            metadata,
            quotes,
        }
    }

    /// Size the order quantity: `notional / price`, quantized to the
    /// market's size step.
    ///
    /// The venue expresses steps as decimal quanta, so quantization rounds
    /// to the step's decimal scale with banker's rounding — the
    /// fixed-point equivalent of quantizing against the step itself.
    /// Returns `None` when the price cannot divide the notional (a
    /// non-positive published price cannot size an order).
    fn size_quantity(notional_usd: Decimal, price: Decimal, rules: &TradingRules) -> Option<Decimal> {
        if price <= Decimal::ZERO {
            return None;
        }
        let raw = notional_usd.checked_div(price)?;
        Some(raw.round_dp_with_strategy(
            rules.min_order_size_step.scale(),
            RoundingStrategy::MidpointNearestEven,
        ))
    }
}

#[async_trait]
impl OrderStrategy for BestPriceStrategy {
    async fn execute(
        &self,
        market: &str,
        side: &str,
        notional_usd: Decimal,
    ) -> Result<OrderId, StrategyError> {
        let market = market.to_uppercase();

        let metadata = self.metadata.get(&market).await.ok_or_else(|| {
            StrategyError::ConfigurationUnavailable {
                market: market.clone(),
            }
        })?;
        let rules = metadata
            .trading
            .ok_or_else(|| StrategyError::ConfigurationUnavailable {
                market: market.clone(),
            })?;

        let quote = self.quotes.best_bid_ask(&market).ok_or_else(|| {
            StrategyError::QuoteUnavailable {
                market: market.clone(),
            }
        })?;

        let side: OrderSide = side.parse().map_err(|_| StrategyError::InvalidSide {
            side: side.to_string(),
        })?;
        let price = quote.price_for(side);

        let quantity = Self::size_quantity(notional_usd, price, &rules).ok_or_else(|| {
            StrategyError::QuoteUnavailable {
                market: market.clone(),
            }
        })?;
        if quantity < rules.min_order_size {
            return Err(StrategyError::BelowMinimumSize {
                quantity,
                minimum: rules.min_order_size,
            });
        }

        let intent = OrderIntent {
            market,
            side,
            price,
            quantity,
        };
        tracing::debug!(
            market = %intent.market,
            side = %intent.side,
            price = %intent.price,
            quantity = %intent.quantity,
            "placing best-price order"
        );

        match self.exchange.place_order(&intent, true).await {
            Ok(order_id) => {
                tracing::info!(
                    market = %intent.market,
                    order_id = %order_id,
                    "order placed at live best price"
                );
                Ok(order_id)
            }
            Err(e) if e.is_insufficient_balance() => Err(StrategyError::InsufficientBalance),
            Err(e) if e.is_quantity_precision() => {
                Err(StrategyError::QuantityPrecision { quantity })
            }
            Err(e) => Err(StrategyError::Execution(e)),
        }
    }
}
