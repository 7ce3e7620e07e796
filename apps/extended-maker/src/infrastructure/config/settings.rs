//! Engine Configuration Settings
//!
//! Settings for the feed supervisor and metadata cache, loaded from
//! environment variables with defaults matching the venue's documented
//! endpoints and the engine's fixed retry cadence.
//!
//! # Environment Variables
//!
//! - `EXTENDED_STREAM_URL`: orderbook stream URL template containing a
//!   `{market}` placeholder
//! - `EXTENDED_RECONNECT_DELAY_SECS`: delay between reconnection attempts
//! - `EXTENDED_RECEIVE_ERROR_DELAY_SECS`: pause after a receive-path error
//!   before tearing the connection down
//! - `EXTENDED_METADATA_TTL_SECS`: market metadata cache TTL

use std::time::Duration;

/// Default per-market orderbook stream endpoint, subscribed at
/// top-of-book depth.
const DEFAULT_STREAM_URL: &str =
    "wss://api.extended.exchange/stream.extended.exchange/v1/orderbooks/{market}?depth=1";

/// Delay between reconnection attempts. Fixed — no exponential backoff,
/// no jitter, no retry cap; retries continue while the market stays
/// desired-active.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Pause after a receive-path error before tearing down the connection.
const DEFAULT_RECEIVE_ERROR_DELAY: Duration = Duration::from_secs(5);

/// Market metadata cache TTL.
const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(60);

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// The rejected raw value.
        value: String,
    },

    /// The stream URL template lacks the `{market}` placeholder.
    #[error("stream URL template is missing the {{market}} placeholder: {url:?}")]
    MissingMarketPlaceholder {
        /// The rejected template.
        url: String,
    },
}

/// Orderbook stream connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Stream URL template with a `{market}` placeholder.
    pub url_template: String,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Pause after a receive-path error before reconnecting.
    pub receive_error_delay: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_STREAM_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            receive_error_delay: DEFAULT_RECEIVE_ERROR_DELAY,
        }
    }
}

impl FeedSettings {
    /// Stream endpoint for one market.
    #[must_use]
    pub fn url_for(&self, market: &str) -> String {
        self.url_template.replace("{market}", market)
    }
}

/// Metadata cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Age past which a cached market listing is considered stale.
    pub metadata_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            metadata_ttl: DEFAULT_METADATA_TTL,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Feed supervisor settings.
    pub feed: FeedSettings,
    /// Metadata cache settings.
    pub cache: CacheSettings,
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable does not parse or the
    /// stream URL template lacks its `{market}` placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url_template = match std::env::var("EXTENDED_STREAM_URL") {
            Ok(url) => url,
            Err(_) => DEFAULT_STREAM_URL.to_string(),
        };
        if !url_template.contains("{market}") {
            return Err(ConfigError::MissingMarketPlaceholder { url: url_template });
        }

        Ok(Self {
            feed: FeedSettings {
                url_template,
                reconnect_delay: duration_from_env(
                    "EXTENDED_RECONNECT_DELAY_SECS",
                    DEFAULT_RECONNECT_DELAY,
                )?,
                receive_error_delay: duration_from_env(
                    "EXTENDED_RECEIVE_ERROR_DELAY_SECS",
                    DEFAULT_RECEIVE_ERROR_DELAY,
                )?,
            },
            cache: CacheSettings {
                metadata_ttl: duration_from_env(
                    "EXTENDED_METADATA_TTL_SECS",
                    DEFAULT_METADATA_TTL,
                )?,
            },
        })
    }
}

/// Read a whole-second duration from `var`, defaulting when unset.
fn duration_from_env(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => parse_seconds(var, &raw),
        Err(_) => Ok(default),
    }
}

/// Parse a whole-second duration value.
fn parse_seconds(var: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_venue_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.feed.reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.feed.receive_error_delay, Duration::from_secs(5));
        assert_eq!(config.cache.metadata_ttl, Duration::from_secs(60));
        assert!(config.feed.url_template.contains("{market}"));
    }

    #[test]
    fn url_template_substitutes_the_market() {
        let settings = FeedSettings::default();
        let url = settings.url_for("BTC-USD");
        assert!(url.ends_with("/v1/orderbooks/BTC-USD?depth=1"));
        assert!(!url.contains("{market}"));
    }

    #[test]
    fn duration_parsing_rejects_garbage() {
        let err = parse_seconds("EXTENDED_RECONNECT_DELAY_SECS", "ten").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, value }
                if var == "EXTENDED_RECONNECT_DELAY_SECS" && value == "ten"
        ));
    }

    #[test]
    fn duration_parsing_accepts_whole_seconds() {
        let parsed = parse_seconds("EXTENDED_METADATA_TTL_SECS", " 15 ").unwrap();
        assert_eq!(parsed, Duration::from_secs(15));
    }

    #[test]
    fn unset_duration_uses_the_default() {
        let parsed =
            duration_from_env("EXTENDED_TEST_UNSET_DURATION", Duration::from_secs(7)).unwrap();
        assert_eq!(parsed, Duration::from_secs(7));
    }
}
