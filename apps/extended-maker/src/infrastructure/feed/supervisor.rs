//! Market Stream Supervisor
//!
//! Owns one supervised WebSocket connection per actively streamed market.
//! Each market gets an independent task that connects to the venue's
//! per-market orderbook endpoint, writes accepted snapshots into the
//! [`SnapshotStore`], and reconnects on a fixed delay for as long as the
//! market stays desired-active.
//!
//! # Lifecycle
//!
//! States per market: `Stopped → Connecting → Streaming → (on drop)
//! Connecting → … → Stopped`. The desired-active flag is the single source
//! of truth for whether a market's loop should keep running; it is
//! distinct from whether the connection is currently open — a market
//! mid-reconnect still counts as active.
//!
//! Stopping is cooperative: the flag is cleared, the market's cancellation
//! token is cancelled (interrupting a blocked receive and prompting an
//! explicit close frame), and the stopper awaits task exit, treating
//! cancellation as the expected, successful outcome. The exiting task —
//! not the stopper — removes its own snapshot entry, so no stale quote
//! survives a stop even if a message was in flight when the stop landed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::messages::{FeedMessage, FeedMessageType};
use crate::application::ports::QuoteSource;
use crate::domain::market::MarketQuote;
use crate::domain::snapshot::SnapshotStore;
use crate::infrastructure::config::FeedSettings;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// =============================================================================
// Supervision Records
// =============================================================================

/// Per-market supervision record.
///
/// Created on first start; removed only after the supervising task has
/// fully exited.
#[derive(Debug)]
struct StreamHandle {
    /// Should this market's loop keep running.
    desired: Arc<AtomicBool>,
    /// Cancelling this interrupts a blocked receive or backoff wait; the
    /// per-market stand-in for a closable connection handle.
    cancel: CancellationToken,
    /// The supervising task.
    task: JoinHandle<()>,
}

/// How one connection's receive loop ended.
enum ReceiveOutcome {
    /// Stop requested; a close frame was sent and the loop must exit.
    Cancelled,
    /// Server closed or the stream ended; reconnect after the standard
    /// delay.
    Disconnected,
    /// Receive-path error; short pause, then tear down and reconnect.
    ReceiveFailed,
}

// =============================================================================
// Supervisor
// =============================================================================

/// Supervises one streaming task per active market and serves cached
/// quotes.
///
/// Constructed once per engine instance; all registries are instance
/// state, so independent supervisors (e.g. in tests) never interfere.
#[derive(Debug)]
pub struct MarketStreamSupervisor {
    settings: FeedSettings,
    store: Arc<SnapshotStore>,
    streams: Mutex<HashMap<String, StreamHandle>>,
}

impl MarketStreamSupervisor {
    /// Create a supervisor with no active streams.
    #[must_use]
    pub fn new(settings: FeedSettings) -> Self {
        Self {
            settings,
            store: Arc::new(SnapshotStore::new()),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or ensure) a supervised stream for each market.
    ///
    /// Market names are normalized to uppercase. Idempotent: a market
    /// whose supervising task is already live only has its desired-active
    /// flag re-asserted — no duplicate task is spawned. Must be called
    /// from within a Tokio runtime.
    pub fn start_streams<I>(&self, markets: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut streams = self.streams.lock();
        for market in markets {
            let market = market.as_ref().to_uppercase();
            if let Some(handle) = streams.get(&market) {
                if !handle.task.is_finished() {
                    handle.desired.store(true, Ordering::SeqCst);
                    tracing::debug!(market = %market, "stream already supervised");
                    continue;
                }
            }

            let desired = Arc::new(AtomicBool::new(true));
            let cancel = CancellationToken::new();
            let worker = StreamWorker {
                market: market.clone(),
                url: self.settings.url_for(&market),
                settings: self.settings.clone(),
                store: Arc::clone(&self.store),
                desired: Arc::clone(&desired),
                cancel: cancel.clone(),
            };

            tracing::info!(market = %market, "starting market stream");
            let task = tokio::spawn(worker.run());
            streams.insert(
                market,
                StreamHandle {
                    desired,
                    cancel,
                    task,
                },
            );
        }
    }

    /// Stop the supervised stream for each market and wait for the tasks
    /// to exit.
    ///
    /// Cancellation is the expected, successful outcome of a stop; it is
    /// never reported as an error. There is no timeout on the wait — a
    /// task that fails to exit is waited on indefinitely (accepted risk;
    /// the cancellation token makes a blocked receive return promptly in
    /// practice).
    pub async fn stop_streams<I>(&self, markets: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut stopping = Vec::new();
        {
            let mut streams = self.streams.lock();
            for market in markets {
                let market = market.as_ref().to_uppercase();
                if let Some(handle) = streams.remove(&market) {
                    handle.desired.store(false, Ordering::SeqCst);
                    handle.cancel.cancel();
                    stopping.push((market, handle.task));
                } else {
                    tracing::debug!(market = %market, "no supervised stream to stop");
                }
            }
        }

        for (market, task) in stopping {
            match task.await {
                Ok(()) => tracing::info!(market = %market, "market stream stopped"),
                Err(e) if e.is_cancelled() => {
                    tracing::info!(market = %market, "market stream cancelled");
                }
                Err(e) => {
                    tracing::error!(market = %market, error = %e, "market stream task failed");
                }
            }
        }
    }

    /// Stop every supervised stream and clear all bookkeeping.
    pub async fn close_all(&self) {
        let markets: Vec<String> = self.streams.lock().keys().cloned().collect();
        if !markets.is_empty() {
            tracing::info!(markets = markets.len(), "closing all market streams");
        }
        self.stop_streams(&markets).await;
        self.streams.lock().clear();
        self.store.clear();
    }

    /// Latest cached quote for `market`.
    ///
    /// A pure cache read: never triggers a connection attempt or refresh.
    #[must_use]
    pub fn best_bid_ask(&self, market: &str) -> Option<MarketQuote> {
        self.store.get(&market.to_uppercase())
    }

    /// Markets whose desired-active flag is set, connected or
    /// mid-reconnect alike.
    #[must_use]
    pub fn active_markets(&self) -> Vec<String> {
        let mut markets: Vec<String> = self
            .streams
            .lock()
            .iter()
            .filter(|(_, handle)| handle.desired.load(Ordering::SeqCst))
            .map(|(market, _)| market.clone())
            .collect();
        markets.sort();
        markets
    }
}

impl QuoteSource for MarketStreamSupervisor {
    fn best_bid_ask(&self, market: &str) -> Option<MarketQuote> {
        self.store.get(&market.to_uppercase())
    }
}

// =============================================================================
// Per-Market Worker
// =============================================================================

/// State owned by one market's supervising task.
struct StreamWorker {
    market: String,
    url: String,
    settings: FeedSettings,
    store: Arc<SnapshotStore>,
    desired: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl StreamWorker {
    /// Connection loop: connect, stream, and reconnect on a fixed delay
    /// while the market stays desired-active.
    ///
    /// Connection failures are never fatal — they are logged and retried
    /// for as long as the market is desired. On exit the task removes its
    /// own snapshot entry; cleanup belongs to the exiting task, not the
    /// stopper.
    async fn run(self) {
        while self.is_desired() {
            tracing::info!(market = %self.market, url = %self.url, "connecting to orderbook stream");
            match tokio_tungstenite::connect_async(&self.url).await {
                Ok((stream, _response)) => {
                    tracing::info!(market = %self.market, "orderbook stream connected");
                    match self.receive_messages(stream).await {
                        ReceiveOutcome::Cancelled => break,
                        ReceiveOutcome::Disconnected => {}
                        ReceiveOutcome::ReceiveFailed => {
                            if self.wait_or_cancel(self.settings.receive_error_delay).await {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(market = %self.market, error = %e, "orderbook stream connection failed");
                }
            }

            if !self.is_desired() {
                break;
            }
            tracing::info!(
                market = %self.market,
                delay_secs = self.settings.reconnect_delay.as_secs(),
                "reconnecting after delay"
            );
            if self.wait_or_cancel(self.settings.reconnect_delay).await {
                break;
            }
        }

        self.store.remove(&self.market);
        tracing::info!(market = %self.market, "market stream listener exited");
    }

    /// Receive messages until cancellation, disconnect, or a receive
    /// error.
    async fn receive_messages(&self, stream: WsStream) -> ReceiveOutcome {
        let (mut write, mut read) = stream.split();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    // Cancellation alone may not unblock the peer; close
                    // the connection explicitly as well.
                    let _ = write.send(Message::Close(None)).await;
                    return ReceiveOutcome::Cancelled;
                }
                message = read.next() => {
                    if let Some(outcome) = self.handle_message(message, &mut write).await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Process one received frame. Returns `Some` when the receive loop
    /// must end.
    async fn handle_message(
        &self,
        message: Option<Result<Message, tungstenite::Error>>,
        write: &mut WsSink,
    ) -> Option<ReceiveOutcome> {
        match message {
            Some(Ok(Message::Text(text))) => {
                self.handle_snapshot(text.as_str());
                None
            }
            Some(Ok(Message::Ping(payload))) => {
                if write.send(Message::Pong(payload)).await.is_err() {
                    return Some(ReceiveOutcome::Disconnected);
                }
                None
            }
            Some(Ok(Message::Close(_))) => {
                tracing::warn!(market = %self.market, "orderbook stream closed by server");
                Some(ReceiveOutcome::Disconnected)
            }
            Some(Ok(_)) => None,
            Some(Err(
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
            )) => {
                tracing::warn!(market = %self.market, "orderbook stream connection closed");
                Some(ReceiveOutcome::Disconnected)
            }
            Some(Err(e)) => {
                tracing::warn!(market = %self.market, error = %e, "orderbook stream receive failed");
                Some(ReceiveOutcome::ReceiveFailed)
            }
            None => {
                tracing::warn!(market = %self.market, "orderbook stream ended");
                Some(ReceiveOutcome::Disconnected)
            }
        }
    }

    /// Parse one text frame and store its quote when acceptable.
    ///
    /// Accepted only when the message is a snapshot, names this worker's
    /// market, and carries both best prices. The store write is gated on
    /// the desired-active flag so a message received just before a stop is
    /// skipped, not merely delayed.
    fn handle_snapshot(&self, text: &str) {
        let message: FeedMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(market = %self.market, error = %e, "undecodable orderbook message");
                return;
            }
        };

        if message.message_type != FeedMessageType::Snapshot {
            tracing::trace!(market = %self.market, "ignoring non-snapshot message");
            return;
        }
        let Some(data) = message.data else {
            tracing::warn!(market = %self.market, "snapshot message without payload");
            return;
        };
        if data.market != self.market {
            tracing::trace!(
                market = %self.market,
                received_for = %data.market,
                "discarding snapshot for another market"
            );
            return;
        }

        let observed_at = message.ts.unwrap_or_else(now_millis);
        let Some(quote) = data.best_quote(observed_at) else {
            tracing::warn!(market = %self.market, "snapshot lacked a best bid or ask price");
            return;
        };

        if !self.store.put_if(&self.market, quote, &self.desired) {
            tracing::debug!(market = %self.market, "dropping quote for market no longer active");
        }
    }

    fn is_desired(&self) -> bool {
        self.desired.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Sleep for `delay` unless cancelled first; returns whether the wait
    /// was cancelled.
    async fn wait_or_cancel(&self, delay: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        }
    }
}

/// Current time as epoch milliseconds; stamps quotes whose message omitted
/// a timestamp.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
