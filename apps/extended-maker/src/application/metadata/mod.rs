//! Market Metadata Cache
//!
//! TTL cache over the venue's bulk market listing. Metadata changes slowly,
//! so one bulk fetch amortizes a network round trip across every market
//! instead of paying one per lookup; the TTL bounds staleness.
//!
//! # Concurrency
//!
//! The cache is mutated only from the caller path: a refresh runs inline in
//! the reader that found its entry missing or expired, never in a
//! background task. Concurrent readers may therefore trigger redundant
//! simultaneous refreshes; that is tolerated — the refresh rewrites the
//! whole map, so the last writer wins and every reader sees a consistent
//! listing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::ExchangeApi;
use crate::domain::market::MarketMetadata;

/// One cached market listing with its fetch time.
#[derive(Debug, Clone)]
struct CacheEntry {
    metadata: MarketMetadata,
    fetched_at: Instant,
}

/// TTL cache of per-market trading metadata, bulk-refreshed on miss or
/// expiry.
pub struct MetadataCache {
    exchange: Arc<dyn ExchangeApi>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MetadataCache {
    /// Create an empty cache over the given venue client.
    #[must_use]
    pub fn new(exchange: Arc<dyn ExchangeApi>, ttl: Duration) -> Self {
        Self {
            exchange,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Metadata for `market`, refreshing the whole cache first when the
    /// entry is missing or older than the TTL.
    ///
    /// A failed refresh is logged and the lookup falls through to whatever
    /// the cache still holds, so a transient venue outage serves the last
    /// known listing rather than erroring.
    pub async fn get(&self, market: &str) -> Option<MarketMetadata> {
        let market = market.to_uppercase();
        if let Some(metadata) = self.fresh_entry(&market) {
            return Some(metadata);
        }

        tracing::debug!(market = %market, "metadata missing or expired, refreshing");
        self.refresh().await;

        self.entries
            .read()
            .get(&market)
            .map(|entry| entry.metadata.clone())
    }

    /// Markets ordered by descending daily volume.
    ///
    /// Refreshes first when the cache is empty or every entry is stale.
    /// Markets with a missing or non-positive volume are excluded, then
    /// the listing is truncated to `top_n` when given.
    pub async fn list(&self, top_n: Option<usize>) -> Vec<MarketMetadata> {
        if self.entirely_stale() {
            tracing::debug!("metadata cache empty or entirely stale, refreshing");
            self.refresh().await;
        }

        let mut markets: Vec<MarketMetadata> = self
            .entries
            .read()
            .values()
            .filter(|entry| {
                entry
                    .metadata
                    .daily_volume
                    .is_some_and(|volume| volume > Decimal::ZERO)
            })
            .map(|entry| entry.metadata.clone())
            .collect();

        markets.sort_by(|a, b| b.daily_volume.cmp(&a.daily_volume));
        if let Some(n) = top_n {
            markets.truncate(n);
        }
        markets
    }

    /// Fetch all markets and rewrite every cache entry with a fresh
    /// timestamp. Errors are logged, not propagated; callers fall through
    /// to the existing entries.
    async fn refresh(&self) {
        match self.exchange.fetch_markets().await {
            Ok(markets) => {
                let fetched_at = Instant::now();
                let count = markets.len();
                *self.entries.write() = markets
                    .into_iter()
                    .map(|metadata| {
                        (
                            metadata.name.clone(),
                            CacheEntry {
                                metadata,
                                fetched_at,
                            },
                        )
                    })
                    .collect();
                tracing::debug!(markets = count, "market metadata cache refreshed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "market metadata refresh failed");
            }
        }
    }

    fn fresh_entry(&self, market: &str) -> Option<MarketMetadata> {
        self.entries
            .read()
            .get(market)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.metadata.clone())
    }

    fn entirely_stale(&self) -> bool {
        let entries = self.entries.read();
        entries.is_empty()
            || entries
                .values()
                .all(|entry| entry.fetched_at.elapsed() >= self.ttl)
    }
}
