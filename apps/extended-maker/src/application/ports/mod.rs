//! Port Definitions
//!
//! Capability interfaces for the external collaborators this crate
//! depends on but does not implement: the venue's trading/metadata client
//! (REST transport, authentication, and order signing all live behind it)
//! and the live-quote source backed by the stream supervisor.

use async_trait::async_trait;

use crate::domain::market::{MarketMetadata, MarketQuote, OrderId, OrderIntent};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by the venue trading client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeApiError {
    /// The request never produced a venue response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The venue rejected the request.
    #[error("venue rejected the request: {message}")]
    Api {
        /// Venue-supplied rejection message.
        message: String,
    },
}

impl ExchangeApiError {
    /// Whether the venue rejected the order for exceeding the available
    /// balance.
    #[must_use]
    pub fn is_insufficient_balance(&self) -> bool {
        self.message_contains("New order cost exceeds available balance")
    }

    /// Whether the venue rejected the order's quantity precision.
    #[must_use]
    pub fn is_quantity_precision(&self) -> bool {
        self.message_contains("Invalid quantity precision")
    }

    fn message_contains(&self, needle: &str) -> bool {
        match self {
            Self::Api { message } => message.contains(needle),
            Self::Transport(_) => false,
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Venue trading and market-metadata client.
///
/// An opaque capability boundary: implementations own signing,
/// authentication, and REST transport. This crate only consumes it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Fetch every market the venue lists, with sizing constraints and
    /// daily statistics.
    async fn fetch_markets(&self) -> Result<Vec<MarketMetadata>, ExchangeApiError>;

    /// Place a limit order. With `post_only` set, the venue rejects any
    /// order that would immediately match instead of resting.
    async fn place_order(
        &self,
        intent: &OrderIntent,
        post_only: bool,
    ) -> Result<OrderId, ExchangeApiError>;

    /// Cancel every open order on the account.
    async fn cancel_all_orders(&self) -> Result<(), ExchangeApiError>;
}

/// Read-only access to the latest cached top-of-book quote per market.
///
/// Implemented by the stream supervisor; a lookup is a cache read and
/// never triggers a connection attempt.
#[cfg_attr(test, mockall::automock)]
pub trait QuoteSource: Send + Sync {
    /// Latest quote for `market`, if one is cached.
    fn best_bid_ask(&self, market: &str) -> Option<MarketQuote>;
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn balance_rejection_is_classified() {
        let err = ExchangeApiError::Api {
            message: "New order cost exceeds available balance".to_string(),
        };
        assert!(err.is_insufficient_balance());
        assert!(!err.is_quantity_precision());
    }

    #[test]
    fn precision_rejection_is_classified() {
        let err = ExchangeApiError::Api {
            message: "Invalid quantity precision for order".to_string(),
        };
        assert!(err.is_quantity_precision());
        assert!(!err.is_insufficient_balance());
    }

    #[test_case(ExchangeApiError::Transport("connection reset".to_string()); "transport")]
    #[test_case(ExchangeApiError::Api { message: "order would cross".to_string() }; "other rejection")]
    fn unrelated_errors_are_unclassified(err: ExchangeApiError) {
        assert!(!err.is_insufficient_balance());
        assert!(!err.is_quantity_precision());
    }
}
