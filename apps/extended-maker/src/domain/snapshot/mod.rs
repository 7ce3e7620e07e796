//! Quote Snapshot Store
//!
//! Holds the latest top-of-book quote per market. The stream supervisor is
//! the only writer; readers (the strategy, display code) receive copies.
//!
//! # Concurrency
//!
//! All state sits behind a single `parking_lot::RwLock`, so a reader never
//! observes a partially constructed quote: quotes are replaced atomically,
//! not mutated in place. Writes are last-write-wins — no ordering check is
//! performed against `observed_at_millis`, because a single connection
//! delivers messages in order and out-of-order delivery is not defended
//! against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::domain::market::MarketQuote;

/// Thread-safe latest-quote-per-market store.
///
/// Constructed once per stream supervisor instance; starts empty and never
/// outlives the process.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    quotes: RwLock<HashMap<String, MarketQuote>>,
}

impl SnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally replace the stored quote for `market`.
    pub fn put(&self, market: &str, quote: MarketQuote) {
        self.quotes.write().insert(market.to_string(), quote);
    }

    /// Replace the stored quote for `market` only while `gate` is still
    /// set, checking the gate under the same write lock that performs the
    /// insert.
    ///
    /// The stream task uses this with the market's desired-active flag so
    /// that an in-flight message received just before a stop request can
    /// never resurrect data for a market whose stop already completed.
    /// Returns whether the quote was stored.
    pub fn put_if(&self, market: &str, quote: MarketQuote, gate: &AtomicBool) -> bool {
        let mut quotes = self.quotes.write();
        if !gate.load(Ordering::SeqCst) {
            return false;
        }
        quotes.insert(market.to_string(), quote);
        true
    }

    /// Current quote for `market`, if any. Never blocks on a refresh.
    #[must_use]
    pub fn get(&self, market: &str) -> Option<MarketQuote> {
        self.quotes.read().get(market).cloned()
    }

    /// Delete the entry for `market`, guaranteeing no stale quote survives
    /// a stream teardown.
    pub fn remove(&self, market: &str) {
        self.quotes.write().remove(market);
    }

    /// Drop every stored quote.
    pub fn clear(&self) {
        self.quotes.write().clear();
    }

    /// Number of markets with a stored quote.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    /// Whether the store holds no quotes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn quote(bid: i64, ask: i64, observed_at_millis: i64) -> MarketQuote {
        MarketQuote {
            bid_price: Decimal::new(bid, 0),
            bid_qty: Decimal::ONE,
            ask_price: Decimal::new(ask, 0),
            ask_qty: Decimal::ONE,
            observed_at_millis,
        }
    }

    #[test]
    fn get_returns_absent_for_unknown_market() {
        let store = SnapshotStore::new();
        assert!(store.get("BTC-USD").is_none());
    }

    #[test]
    fn put_replaces_wholesale() {
        let store = SnapshotStore::new();
        store.put("BTC-USD", quote(100, 101, 1));
        store.put("BTC-USD", quote(102, 103, 2));

        let stored = store.get("BTC-USD").unwrap();
        assert_eq!(stored, quote(102, 103, 2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_write_wins_even_for_older_timestamps() {
        let store = SnapshotStore::new();
        store.put("BTC-USD", quote(100, 101, 20));
        store.put("BTC-USD", quote(99, 100, 10));

        // No sequencing defense: the later write sticks regardless of its
        // observation timestamp.
        assert_eq!(store.get("BTC-USD").unwrap().observed_at_millis, 10);
    }

    #[test]
    fn put_if_respects_the_gate() {
        let store = SnapshotStore::new();
        let gate = AtomicBool::new(true);

        assert!(store.put_if("BTC-USD", quote(100, 101, 1), &gate));
        gate.store(false, Ordering::SeqCst);
        assert!(!store.put_if("BTC-USD", quote(102, 103, 2), &gate));

        assert_eq!(store.get("BTC-USD").unwrap(), quote(100, 101, 1));
    }

    #[test]
    fn remove_deletes_only_the_named_market() {
        let store = SnapshotStore::new();
        store.put("BTC-USD", quote(100, 101, 1));
        store.put("ETH-USD", quote(50, 51, 1));

        store.remove("BTC-USD");

        assert!(store.get("BTC-USD").is_none());
        assert!(store.get("ETH-USD").is_some());
    }

    #[test]
    fn clear_empties_the_store() {
        let store = SnapshotStore::new();
        store.put("BTC-USD", quote(100, 101, 1));
        store.put("ETH-USD", quote(50, 51, 1));

        store.clear();

        assert!(store.is_empty());
    }
}
