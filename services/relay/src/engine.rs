//! Relay engine: single sequential owner of all mutable state
//!
//! Order books, trade rings, subscription sets, the aggregate interest set,
//! and the session table are all owned by one engine instance and mutated
//! only from its event loop. Transports never call into the engine
//! directly; the upstream connector and every session task feed events into
//! one `mpsc` channel, which preserves per-connection ordering and removes
//! the need for locks.
//!
//! Nothing the engine handles is fatal: malformed input is logged and
//! ignored, store failures degrade to transient state, and a lost upstream
//! connection is recovered by the connector's reconnect loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use types::catalog::ProductCatalog;
use types::ids::ProductId;

use crate::book::BookStore;
use crate::broadcast::Broadcaster;
use crate::config::{IdentityScheme, RelayConfig};
use crate::feed::FeedCommand;
use crate::protocol::{ClientAction, ClientRequest, FeedMessage, ServerMessage};
use crate::session::{IdentityGenerator, NamePool, SessionId, SessionTable, TokenGenerator};
use crate::store::SubscriptionStore;
use crate::subscriptions::{RegistryChange, SubscriptionRegistry};
use crate::trades::TradeHistory;

/// Every event the engine reacts to, in arrival order.
#[derive(Debug)]
pub enum EngineEvent {
    /// Parsed message from the upstream feed.
    Upstream(FeedMessage),
    /// The upstream connection was (re-)established.
    UpstreamConnected,
    /// The upstream connection was lost.
    UpstreamDown,
    /// A downstream session connected; the engine replies with its id.
    SessionConnected {
        outbound: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<SessionId>,
    },
    /// A downstream session sent a subscribe/unsubscribe request.
    SessionRequest {
        session: SessionId,
        request: ClientRequest,
    },
    /// A downstream session disconnected.
    SessionClosed { session: SessionId },
}

/// The relay engine. Constructed at startup, torn down at shutdown.
pub struct RelayEngine {
    catalog: ProductCatalog,
    books: BookStore,
    trades: TradeHistory,
    registry: SubscriptionRegistry,
    broadcaster: Broadcaster,
    sessions: SessionTable,
    store: Arc<dyn SubscriptionStore>,
    feed_tx: mpsc::Sender<FeedCommand>,
    upstream_open: bool,
}

impl RelayEngine {
    pub fn new(
        config: &RelayConfig,
        store: Arc<dyn SubscriptionStore>,
        feed_tx: mpsc::Sender<FeedCommand>,
    ) -> Self {
        let catalog = ProductCatalog::new(config.products.clone());
        let identity: Box<dyn IdentityGenerator> = match config.identity_scheme {
            IdentityScheme::NamePool => Box::<NamePool>::default(),
            IdentityScheme::Token => Box::new(TokenGenerator),
        };

        Self {
            catalog: catalog.clone(),
            books: BookStore::new(),
            trades: TradeHistory::new(config.trade_history_capacity),
            registry: SubscriptionRegistry::new(catalog),
            broadcaster: Broadcaster::new(),
            sessions: SessionTable::new(identity),
            store,
            feed_tx,
            upstream_open: false,
        }
    }

    /// Run the event loop until every event sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!(products = self.catalog.len(), "Relay engine started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Relay engine stopped");
    }

    async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Upstream(message) => self.on_upstream(message),
            EngineEvent::UpstreamConnected => self.on_upstream_connected().await,
            EngineEvent::UpstreamDown => {
                self.upstream_open = false;
                info!("Upstream connection lost; awaiting reconnect");
            }
            EngineEvent::SessionConnected { outbound, reply } => {
                self.on_session_connected(outbound, reply).await;
            }
            EngineEvent::SessionRequest { session, request } => {
                self.on_session_request(session, request).await;
            }
            EngineEvent::SessionClosed { session } => self.on_session_closed(session).await,
        }
    }

    /// Dispatch one upstream feed message.
    fn on_upstream(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Snapshot {
                product_id,
                bids,
                asks,
            } => {
                debug!(product = %product_id, bids = bids.len(), asks = asks.len(), "Book snapshot");
                self.books.apply_snapshot(product_id.clone(), bids, asks);
                self.publish_book(&product_id);
            }
            FeedMessage::L2update {
                product_id,
                changes,
            } => {
                if self.books.apply_diff(&product_id, &changes) {
                    self.publish_book(&product_id);
                }
            }
            FeedMessage::Match(trade) => {
                let product = trade.product_id.clone();
                self.trades.record(trade.clone());
                self.broadcaster.publish_trade(&self.registry, &product, trade);
            }
            FeedMessage::Subscriptions { channels } => {
                info!(channels = channels.len(), "Upstream channel confirmation");
                self.broadcaster.publish_status(channels);
            }
            FeedMessage::Error { message } => {
                warn!(%message, "Upstream feed error");
            }
        }
    }

    /// Fan out the current book state for one product.
    fn publish_book(&mut self, product: &ProductId) {
        if let Some(snapshot) = self.books.snapshot_of(product) {
            self.broadcaster
                .publish_book_update(&self.registry, product, snapshot);
        }
    }

    /// A fresh upstream connection: batch-subscribe the aggregate set.
    async fn on_upstream_connected(&mut self) {
        self.upstream_open = true;
        let aggregate = self.registry.aggregate();
        info!(products = aggregate.len(), "Upstream connected");
        if !aggregate.is_empty() {
            self.send_feed_command(FeedCommand::Subscribe(aggregate)).await;
        }
    }

    /// Session connect: assign identity, restore saved subscriptions,
    /// announce identity and subscription set to that session only.
    async fn on_session_connected(
        &mut self,
        outbound: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<SessionId>,
    ) {
        let (session, identity) = self.sessions.connect();

        let restored = match self.store.get(&identity).await {
            Ok(Some(products)) => products,
            Ok(None) => Vec::new(),
            Err(error) => {
                warn!(session, %identity, %error, "Store unavailable; using transient subscriptions");
                Vec::new()
            }
        };

        self.broadcaster.register(session, outbound);
        let newly_interested = self.registry.register(session, restored);
        if self.upstream_open && !newly_interested.is_empty() {
            self.send_feed_command(FeedCommand::Subscribe(newly_interested))
                .await;
        }

        self.broadcaster.send_to(
            session,
            ServerMessage::UserId {
                user_id: identity.clone(),
            },
        );
        self.announce_subscriptions(session);

        if reply.send(session).is_err() {
            // The session task died before learning its id; clean up now.
            debug!(session, "Session vanished during connect");
            self.on_session_closed(session).await;
        }
    }

    /// Session subscribe/unsubscribe request.
    ///
    /// Unknown products are ignored without an error event back (the
    /// protocol surface stays minimal); persistence failures are logged and
    /// the session continues with transient state.
    async fn on_session_request(&mut self, session: SessionId, request: ClientRequest) {
        let Some(product) = self.catalog.resolve(&request.product) else {
            debug!(session, product = %request.product, "Ignoring request for unknown product");
            return;
        };

        let change = match request.action {
            ClientAction::Subscribe => self.registry.subscribe(session, &product),
            ClientAction::Unsubscribe => self.registry.unsubscribe(session, &product),
        };

        match change {
            RegistryChange::FirstSubscriber => {
                if self.upstream_open {
                    self.send_feed_command(FeedCommand::Subscribe(vec![product.clone()]))
                        .await;
                }
            }
            RegistryChange::LastSubscriber => {
                if self.upstream_open {
                    self.send_feed_command(FeedCommand::Unsubscribe(vec![product.clone()]))
                        .await;
                }
            }
            RegistryChange::Changed | RegistryChange::NoOp => {}
        }

        self.persist_subscriptions(session).await;
        self.announce_subscriptions(session);
    }

    /// Session disconnect: release subscriptions, drop orphaned upstream
    /// interest, retire the identity.
    async fn on_session_closed(&mut self, session: SessionId) {
        let orphaned = self.registry.release_all(session);
        if self.upstream_open && !orphaned.is_empty() {
            self.send_feed_command(FeedCommand::Unsubscribe(orphaned))
                .await;
        }
        self.broadcaster.remove(session);
        self.sessions.disconnect(session);
    }

    /// Best-effort write of the session's current set to the store.
    async fn persist_subscriptions(&mut self, session: SessionId) {
        let Some(products) = self.registry.products_of(session) else {
            return;
        };
        let Some(identity) = self.sessions.identity_of(session) else {
            return;
        };
        if let Err(error) = self.store.put(identity, &products).await {
            warn!(session, %error, "Failed to persist subscriptions; continuing in-memory");
        }
    }

    /// Send the session its current subscription set.
    fn announce_subscriptions(&mut self, session: SessionId) {
        if let Some(products) = self.registry.products_of(session) {
            self.broadcaster
                .send_to(session, ServerMessage::Subscriptions { products });
        }
    }

    /// Forward a command to the upstream connector, fire-and-forget.
    async fn send_feed_command(&mut self, command: FeedCommand) {
        if self.feed_tx.send(command).await.is_err() {
            warn!("Upstream connector unavailable; command dropped");
        }
    }
}
