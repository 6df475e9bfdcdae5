//! Subscription-scoped event fan-out
//!
//! Delivers book-update and trade events only to sessions whose subscription
//! set includes the affected product, and status events to every live
//! session. Each session has a bounded outbound channel: a session whose
//! channel is full or closed is skipped for that delivery — never queued
//! further, never retried — so one slow consumer cannot stall fan-out to
//! the others.
//!
//! Events for a single product reach each subscribed session in the order
//! the engine produced them; no ordering is guaranteed across products.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use types::ids::ProductId;

use crate::book::BookSnapshot;
use crate::protocol::{ChannelStatus, ServerMessage, TradePrint};
use crate::session::SessionId;
use crate::subscriptions::SubscriptionRegistry;

/// Fan-out broadcaster over live session channels.
#[derive(Debug, Default)]
pub struct Broadcaster {
    senders: BTreeMap<SessionId, mpsc::Sender<ServerMessage>>,
    deliveries_skipped: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session's outbound channel.
    pub fn register(&mut self, session: SessionId, sender: mpsc::Sender<ServerMessage>) {
        self.senders.insert(session, sender);
    }

    /// Detach a session's outbound channel.
    pub fn remove(&mut self, session: SessionId) {
        self.senders.remove(&session);
    }

    /// Deliver a book update to every session subscribed to the product.
    pub fn publish_book_update(
        &mut self,
        registry: &SubscriptionRegistry,
        product: &ProductId,
        snapshot: BookSnapshot,
    ) {
        let sessions: Vec<SessionId> = self
            .senders
            .keys()
            .copied()
            .filter(|id| registry.is_subscribed(*id, product))
            .collect();

        for session in sessions {
            self.send_to(
                session,
                ServerMessage::Price {
                    product: product.clone(),
                    data: snapshot.clone(),
                },
            );
        }
    }

    /// Deliver a trade print to every session subscribed to the product.
    pub fn publish_trade(
        &mut self,
        registry: &SubscriptionRegistry,
        product: &ProductId,
        trade: TradePrint,
    ) {
        let sessions: Vec<SessionId> = self
            .senders
            .keys()
            .copied()
            .filter(|id| registry.is_subscribed(*id, product))
            .collect();

        for session in sessions {
            self.send_to(
                session,
                ServerMessage::Match {
                    product: product.clone(),
                    data: trade.clone(),
                },
            );
        }
    }

    /// Deliver a feed-wide channel confirmation to all live sessions.
    pub fn publish_status(&mut self, channels: Vec<ChannelStatus>) {
        let sessions: Vec<SessionId> = self.senders.keys().copied().collect();
        for session in sessions {
            self.send_to(
                session,
                ServerMessage::Channels {
                    data: channels.clone(),
                },
            );
        }
    }

    /// Deliver one message to one session; skip on full or closed channel.
    pub fn send_to(&mut self, session: SessionId, message: ServerMessage) {
        let Some(sender) = self.senders.get(&session) else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.deliveries_skipped += 1;
                warn!(
                    session,
                    skipped = self.deliveries_skipped,
                    "Skipping delivery to slow session"
                );
            }
            Err(TrySendError::Closed(_)) => {
                // Session is shutting down; the engine removes it on close.
                self.deliveries_skipped += 1;
                debug!(session, "Skipping delivery to closed session");
            }
        }
    }

    /// Number of attached sessions.
    pub fn session_count(&self) -> usize {
        self.senders.len()
    }

    /// Total deliveries skipped for slow or closed sessions.
    pub fn deliveries_skipped(&self) -> u64 {
        self.deliveries_skipped
    }
}
