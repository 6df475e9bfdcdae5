//! End-to-end relay flow tests
//!
//! Drives the relay engine through its event channel the same way the
//! transports do, and validates:
//! - Session connect announcements and identity assignment
//! - Ref-counted upstream subscribe/unsubscribe
//! - Subscription-scoped fan-out of books and trades
//! - Diff handling before a snapshot arrives
//! - Persistence restore on reconnect

use std::sync::Arc;
use std::time::Duration;

use relay::config::RelayConfig;
use relay::engine::{EngineEvent, RelayEngine};
use relay::feed::FeedCommand;
use relay::protocol::{ClientAction, ClientRequest, FeedMessage, ServerMessage, TradePrint};
use relay::session::SessionId;
use relay::store::{MemoryStore, SubscriptionStore};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use types::ids::ProductId;
use types::market::Side;

struct TestRelay {
    engine_tx: mpsc::Sender<EngineEvent>,
    feed_rx: mpsc::Receiver<FeedCommand>,
    store: Arc<MemoryStore>,
}

fn start_relay() -> TestRelay {
    let config = RelayConfig::default();
    let (engine_tx, engine_rx) = mpsc::channel(64);
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let store = Arc::new(MemoryStore::new());
    let engine = RelayEngine::new(&config, store.clone(), feed_tx);
    tokio::spawn(engine.run(engine_rx));
    TestRelay {
        engine_tx,
        feed_rx,
        store,
    }
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn btc() -> ProductId {
    ProductId::new("BTC-USD")
}

async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for server message")
        .expect("session channel closed")
}

async fn recv_command(rx: &mut mpsc::Receiver<FeedCommand>) -> FeedCommand {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for feed command")
        .expect("feed channel closed")
}

/// Connect a session and consume the connect announcements, returning the
/// assigned id, identity, and announced subscription set.
async fn connect_session(
    relay: &TestRelay,
) -> (SessionId, String, Vec<ProductId>, mpsc::Receiver<ServerMessage>) {
    let (tx, mut rx) = mpsc::channel(32);
    let (reply_tx, reply_rx) = oneshot::channel();
    relay
        .engine_tx
        .send(EngineEvent::SessionConnected {
            outbound: tx,
            reply: reply_tx,
        })
        .await
        .unwrap();
    let session = reply_rx.await.unwrap();

    let identity = match recv(&mut rx).await {
        ServerMessage::UserId { user_id } => user_id,
        other => panic!("expected userId first, got {other:?}"),
    };
    let subscriptions = match recv(&mut rx).await {
        ServerMessage::Subscriptions { products } => products,
        other => panic!("expected subscriptions, got {other:?}"),
    };
    (session, identity, subscriptions, rx)
}

async fn send_request(relay: &TestRelay, session: SessionId, action: ClientAction, product: &str) {
    relay
        .engine_tx
        .send(EngineEvent::SessionRequest {
            session,
            request: ClientRequest {
                action,
                product: product.to_string(),
            },
        })
        .await
        .unwrap();
}

fn make_trade(product: &ProductId, sequence: u64) -> TradePrint {
    TradePrint {
        product_id: product.clone(),
        trade_id: sequence,
        sequence,
        price: dec("100.5"),
        size: dec("0.25"),
        side: Side::Buy,
        time: "2024-02-16T21:24:16.789Z".to_string(),
    }
}

#[tokio::test]
async fn test_connect_assigns_pool_identities_in_order() {
    let relay = start_relay();
    let (_, first, subs, _rx1) = connect_session(&relay).await;
    let (_, second, _, _rx2) = connect_session(&relay).await;

    assert_eq!(first, "Alice");
    assert_eq!(second, "Bob");
    assert!(subs.is_empty());
}

#[tokio::test]
async fn test_shared_interest_sends_one_upstream_subscribe() {
    let mut relay = start_relay();
    relay
        .engine_tx
        .send(EngineEvent::UpstreamConnected)
        .await
        .unwrap();

    let (first, _, _, mut rx1) = connect_session(&relay).await;
    let (second, _, _, mut rx2) = connect_session(&relay).await;

    send_request(&relay, first, ClientAction::Subscribe, "BTC-USD").await;
    send_request(&relay, second, ClientAction::Subscribe, "BTC-USD").await;

    // Both sessions see their updated set.
    assert!(matches!(
        recv(&mut rx1).await,
        ServerMessage::Subscriptions { products } if products == vec![btc()]
    ));
    assert!(matches!(
        recv(&mut rx2).await,
        ServerMessage::Subscriptions { products } if products == vec![btc()]
    ));

    // Only the first subscriber crossed the 0 -> 1 boundary upstream.
    assert_eq!(
        recv_command(&mut relay.feed_rx).await,
        FeedCommand::Subscribe(vec![btc()])
    );
    assert!(relay.feed_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_book_updates_scoped_to_subscribers() {
    let relay = start_relay();
    let (subscriber, _, _, mut sub_rx) = connect_session(&relay).await;
    let (_bystander, _, _, mut other_rx) = connect_session(&relay).await;

    send_request(&relay, subscriber, ClientAction::Subscribe, "BTC-USD").await;
    assert!(matches!(
        recv(&mut sub_rx).await,
        ServerMessage::Subscriptions { .. }
    ));

    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::Snapshot {
            product_id: btc(),
            bids: vec![(dec("100"), dec("2"))],
            asks: vec![(dec("101"), dec("1"))],
        }))
        .await
        .unwrap();

    match recv(&mut sub_rx).await {
        ServerMessage::Price { product, data } => {
            assert_eq!(product, btc());
            assert_eq!(data.bids, vec![(dec("100"), dec("2"))]);
            assert_eq!(data.asks, vec![(dec("101"), dec("1"))]);
        }
        other => panic!("expected price update, got {other:?}"),
    }

    // A diff refreshes the merged book for the same audience.
    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::L2update {
            product_id: btc(),
            changes: vec![
                (Side::Buy, dec("100"), dec("0")),
                (Side::Sell, dec("102"), dec("3")),
            ],
        }))
        .await
        .unwrap();

    match recv(&mut sub_rx).await {
        ServerMessage::Price { data, .. } => {
            assert!(data.bids.is_empty());
            assert_eq!(data.asks, vec![(dec("101"), dec("1")), (dec("102"), dec("3"))]);
        }
        other => panic!("expected price update, got {other:?}"),
    }

    assert!(other_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_diff_before_snapshot_produces_no_update() {
    let relay = start_relay();
    let (session, _, _, mut rx) = connect_session(&relay).await;
    send_request(&relay, session, ClientAction::Subscribe, "ETH-USD").await;
    assert!(matches!(
        recv(&mut rx).await,
        ServerMessage::Subscriptions { .. }
    ));

    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::L2update {
            product_id: ProductId::new("ETH-USD"),
            changes: vec![(Side::Buy, dec("10"), dec("1"))],
        }))
        .await
        .unwrap();

    // A trade afterwards still flows, proving the engine kept running.
    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::Match(make_trade(
            &ProductId::new("ETH-USD"),
            1,
        ))))
        .await
        .unwrap();

    match recv(&mut rx).await {
        ServerMessage::Match { product, data } => {
            assert_eq!(product, ProductId::new("ETH-USD"));
            assert_eq!(data.sequence, 1);
        }
        other => panic!("expected trade, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_releases_orphaned_interest() {
    let mut relay = start_relay();
    relay
        .engine_tx
        .send(EngineEvent::UpstreamConnected)
        .await
        .unwrap();

    let (holder, _, _, _hold_rx) = connect_session(&relay).await;
    let (leaver, _, _, _leave_rx) = connect_session(&relay).await;
    send_request(&relay, holder, ClientAction::Subscribe, "BTC-USD").await;
    send_request(&relay, leaver, ClientAction::Subscribe, "ETH-USD").await;
    assert_eq!(
        recv_command(&mut relay.feed_rx).await,
        FeedCommand::Subscribe(vec![btc()])
    );
    assert_eq!(
        recv_command(&mut relay.feed_rx).await,
        FeedCommand::Subscribe(vec![ProductId::new("ETH-USD")])
    );

    relay
        .engine_tx
        .send(EngineEvent::SessionClosed { session: leaver })
        .await
        .unwrap();

    // Only the product that lost its last subscriber is released.
    assert_eq!(
        recv_command(&mut relay.feed_rx).await,
        FeedCommand::Unsubscribe(vec![ProductId::new("ETH-USD")])
    );
    assert!(relay.feed_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_saved_subscriptions_restored_on_reconnect() {
    let mut relay = start_relay();
    relay
        .engine_tx
        .send(EngineEvent::UpstreamConnected)
        .await
        .unwrap();

    relay.store.put("Alice", &[btc()]).await.unwrap();

    let (_, identity, restored, _rx) = connect_session(&relay).await;
    assert_eq!(identity, "Alice");
    assert_eq!(restored, vec![btc()]);

    // The restored interest reaches the upstream feed too.
    assert_eq!(
        recv_command(&mut relay.feed_rx).await,
        FeedCommand::Subscribe(vec![btc()])
    );
}

#[tokio::test]
async fn test_subscription_survives_in_store_after_disconnect() {
    let relay = start_relay();
    let (session, identity, _, mut rx) = connect_session(&relay).await;
    send_request(&relay, session, ClientAction::Subscribe, "BTC-USD").await;
    assert!(matches!(
        recv(&mut rx).await,
        ServerMessage::Subscriptions { .. }
    ));

    relay
        .engine_tx
        .send(EngineEvent::SessionClosed { session })
        .await
        .unwrap();

    // A second connect reuses the recycled identity and restores the set.
    let (_, second_identity, restored, _rx2) = connect_session(&relay).await;
    assert_eq!(second_identity, identity);
    assert_eq!(restored, vec![btc()]);
}

#[tokio::test]
async fn test_unsubscribe_drops_delivery() {
    let relay = start_relay();
    let (session, _, _, mut rx) = connect_session(&relay).await;
    send_request(&relay, session, ClientAction::Subscribe, "BTC-USD").await;
    assert!(matches!(
        recv(&mut rx).await,
        ServerMessage::Subscriptions { .. }
    ));
    send_request(&relay, session, ClientAction::Unsubscribe, "BTC-USD").await;
    match recv(&mut rx).await {
        ServerMessage::Subscriptions { products } => assert!(products.is_empty()),
        other => panic!("expected subscriptions, got {other:?}"),
    }

    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::Match(make_trade(&btc(), 7))))
        .await
        .unwrap();
    relay
        .engine_tx
        .send(EngineEvent::Upstream(FeedMessage::Subscriptions {
            channels: Vec::new(),
        }))
        .await
        .unwrap();

    // The channel status broadcast arrives, the trade does not.
    assert!(matches!(recv(&mut rx).await, ServerMessage::Channels { .. }));
    assert!(rx.try_recv().is_err());
}
