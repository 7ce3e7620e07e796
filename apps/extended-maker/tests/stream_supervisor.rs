//! Stream Supervisor Integration Tests
//!
//! Runs the supervisor against an in-process WebSocket server that speaks
//! the Extended orderbook wire format, covering the live-update, stop,
//! idempotent-start, reconnect, and shutdown properties end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use extended_maker::{FeedSettings, MarketStreamSupervisor};

/// Produces the raw frames served to one connection, keyed by the market
/// parsed from the request path.
type MessageFactory = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

struct FeedServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FeedServer {
    fn settings(&self) -> FeedSettings {
        FeedSettings {
            url_template: format!("ws://{}/v1/orderbooks/{{market}}?depth=1", self.addr),
            reconnect_delay: Duration::from_millis(200),
            receive_error_delay: Duration::from_millis(100),
        }
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind a local feed server. Each accepted connection receives the
/// factory's frames for its market; with `drop_after_send` the server then
/// closes the connection, otherwise it holds it open until the client
/// closes.
async fn spawn_feed_server(factory: MessageFactory, drop_after_send: bool) -> FeedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let accepted = Arc::clone(&connections);
    let handle = tokio::spawn(async move {
        loop {
            let Ok((socket, _peer)) = listener.accept().await else {
                break;
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            let factory = Arc::clone(&factory);
            tokio::spawn(async move {
                serve_connection(socket, factory, drop_after_send).await;
            });
        }
    });

    FeedServer {
        addr,
        connections,
        handle,
    }
}

async fn serve_connection(socket: TcpStream, factory: MessageFactory, drop_after_send: bool) {
    let mut path = String::new();
    let callback = |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok(resp)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
        return;
    };

    let market = path.rsplit('/').next().unwrap_or_default().to_string();
    for frame in factory(&market) {
        if ws.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }

    if drop_after_send {
        let _ = ws.close(None).await;
        return;
    }

    // Hold the connection open until the client closes it.
    while let Some(Ok(frame)) = ws.next().await {
        if frame.is_close() {
            break;
        }
    }
}

fn snapshot(market: &str, bid: &str, ask: &str) -> String {
    format!(
        r#"{{"type":"SNAPSHOT","ts":1717171717000,"data":{{"m":"{market}","b":[{{"p":"{bid}","q":"1"}}],"a":[{{"p":"{ask}","q":"2"}}]}}}}"#
    )
}

fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

/// Poll `condition` until it holds or the deadline passes.
async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

const DEADLINE: Duration = Duration::from_secs(5);

// =============================================================================
// Live Quote Updates
// =============================================================================

#[tokio::test]
async fn live_quote_reflects_the_most_recent_snapshot() {
    let server = spawn_feed_server(
        Arc::new(|market| {
            vec![
                snapshot(market, "100", "101"),
                snapshot(market, "100.5", "101.5"),
            ]
        }),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor
                .best_bid_ask("BTC-USD")
                .is_some_and(|quote| quote.bid_price == dec("100.5"))
        })
        .await,
        "cached quote never caught up to the latest snapshot"
    );

    let quote = supervisor.best_bid_ask("BTC-USD").unwrap();
    assert_eq!(quote.ask_price, dec("101.5"));
    assert_eq!(quote.bid_qty, dec("1"));
    assert_eq!(quote.ask_qty, dec("2"));
    assert_eq!(quote.observed_at_millis, 1_717_171_717_000);

    supervisor.close_all().await;
}

#[tokio::test]
async fn malformed_frames_are_skipped_without_dropping_the_connection() {
    let server = spawn_feed_server(
        Arc::new(|market| {
            vec![
                "not json at all".to_string(),
                r#"{"type":"SNAPSHOT"}"#.to_string(),
                snapshot(market, "42", "43"),
            ]
        }),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor.best_bid_ask("BTC-USD").is_some()
        })
        .await
    );

    // The valid snapshot after the garbage arrived over the same
    // connection.
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.best_bid_ask("BTC-USD").unwrap().bid_price, dec("42"));

    supervisor.close_all().await;
}

#[tokio::test]
async fn snapshots_for_another_market_are_discarded() {
    let server = spawn_feed_server(
        Arc::new(|_market| vec![snapshot("ETH-USD", "100", "101")]),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            server.connections.load(Ordering::SeqCst) >= 1
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(supervisor.best_bid_ask("BTC-USD").is_none());
    assert!(supervisor.best_bid_ask("ETH-USD").is_none());

    supervisor.close_all().await;
}

#[tokio::test]
async fn one_sided_snapshots_are_discarded() {
    let server = spawn_feed_server(
        Arc::new(|market| {
            vec![format!(
                r#"{{"type":"SNAPSHOT","data":{{"m":"{market}","b":[{{"p":"100","q":"1"}}],"a":[]}}}}"#
            )]
        }),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            server.connections.load(Ordering::SeqCst) >= 1
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(supervisor.best_bid_ask("BTC-USD").is_none());

    supervisor.close_all().await;
}

// =============================================================================
// Stop & Shutdown
// =============================================================================

#[tokio::test]
async fn stop_removes_the_cached_quote() {
    let server = spawn_feed_server(
        Arc::new(|market| vec![snapshot(market, "100", "101")]),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor.best_bid_ask("BTC-USD").is_some()
        })
        .await
    );

    supervisor.stop_streams(["BTC-USD"]).await;

    assert!(supervisor.best_bid_ask("BTC-USD").is_none());
    assert!(supervisor.active_markets().is_empty());
}

#[tokio::test]
async fn stopping_one_market_leaves_the_other_streaming() {
    let server = spawn_feed_server(
        Arc::new(|market| vec![snapshot(market, "100", "101")]),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD", "ETH-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor.best_bid_ask("BTC-USD").is_some()
                && supervisor.best_bid_ask("ETH-USD").is_some()
        })
        .await
    );

    supervisor.stop_streams(["BTC-USD"]).await;

    assert!(supervisor.best_bid_ask("BTC-USD").is_none());
    assert!(supervisor.best_bid_ask("ETH-USD").is_some());
    assert_eq!(supervisor.active_markets(), vec!["ETH-USD".to_string()]);

    supervisor.close_all().await;
}

#[tokio::test]
async fn close_all_clears_active_markets_and_every_quote() {
    let server = spawn_feed_server(
        Arc::new(|market| vec![snapshot(market, "100", "101")]),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD", "ETH-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor.best_bid_ask("BTC-USD").is_some()
                && supervisor.best_bid_ask("ETH-USD").is_some()
        })
        .await
    );

    supervisor.close_all().await;

    assert!(supervisor.active_markets().is_empty());
    assert!(supervisor.best_bid_ask("BTC-USD").is_none());
    assert!(supervisor.best_bid_ask("ETH-USD").is_none());
}

// =============================================================================
// Supervision
// =============================================================================

#[tokio::test]
async fn repeated_start_keeps_a_single_connection() {
    let server = spawn_feed_server(
        Arc::new(|market| vec![snapshot(market, "100", "101")]),
        false,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);
    assert!(
        wait_until(DEADLINE, || {
            supervisor.best_bid_ask("BTC-USD").is_some()
        })
        .await
    );

    supervisor.start_streams(["BTC-USD"]);
    supervisor.start_streams(["btc-usd"]);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.active_markets(), vec!["BTC-USD".to_string()]);

    supervisor.close_all().await;
}

#[tokio::test]
async fn supervisor_reconnects_after_the_server_drops() {
    let server = spawn_feed_server(
        Arc::new(|market| vec![snapshot(market, "100", "101")]),
        true,
    )
    .await;
    let supervisor = MarketStreamSupervisor::new(server.settings());

    supervisor.start_streams(["BTC-USD"]);

    // Every connection is dropped right after one snapshot; the fixed
    // reconnect delay must bring a fresh connection each time.
    assert!(
        wait_until(DEADLINE, || {
            server.connections.load(Ordering::SeqCst) >= 2
        })
        .await,
        "supervisor never reconnected after the server dropped the stream"
    );

    supervisor.close_all().await;
}
