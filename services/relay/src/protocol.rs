//! Wire protocol for the upstream feed and downstream sessions
//!
//! Upstream messages are JSON objects discriminated by `type`
//! (`snapshot`/`l2update`/`match`/`subscriptions`/`error`); prices and sizes
//! travel as decimal strings. Downstream sessions send `{action, product}`
//! requests and receive outbound objects discriminated by `type`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::ProductId;
use types::market::Side;

use crate::book::BookSnapshot;

/// Channels requested from the upstream feed for every product.
pub const FEED_CHANNELS: [&str; 2] = ["level2", "matches"];

/// A `[price, size]` pair as sent by the upstream feed.
pub type WireLevel = (Decimal, Decimal);

/// A `[side, price, size]` book change from an `l2update` batch.
pub type LevelChange = (Side, Decimal, Decimal);

/// Outbound request to the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedRequest {
    Subscribe {
        product_ids: Vec<ProductId>,
        channels: Vec<String>,
    },
    Unsubscribe {
        product_ids: Vec<ProductId>,
        channels: Vec<String>,
    },
}

impl FeedRequest {
    /// Build a subscribe request for the standard channel pair.
    pub fn subscribe(product_ids: Vec<ProductId>) -> Self {
        Self::Subscribe {
            product_ids,
            channels: FEED_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Build an unsubscribe request for the standard channel pair.
    pub fn unsubscribe(product_ids: Vec<ProductId>) -> Self {
        Self::Unsubscribe {
            product_ids,
            channels: FEED_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A trade print from the upstream `match` channel.
///
/// Immutable once received; appended to exactly one per-product ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePrint {
    pub product_id: ProductId,
    #[serde(default)]
    pub trade_id: u64,
    #[serde(default)]
    pub sequence: u64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    /// Upstream execution timestamp, carried through as sent (ISO-8601).
    #[serde(default)]
    pub time: String,
}

/// Per-channel confirmation entry from the upstream `subscriptions` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

/// Inbound message from the upstream feed, discriminated by `type`.
///
/// Messages with an unrecognized `type` fail to parse and are logged and
/// dropped by the connector; they never terminate the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    Snapshot {
        product_id: ProductId,
        #[serde(default)]
        bids: Vec<WireLevel>,
        #[serde(default)]
        asks: Vec<WireLevel>,
    },
    L2update {
        product_id: ProductId,
        changes: Vec<LevelChange>,
    },
    Match(TradePrint),
    Subscriptions {
        channels: Vec<ChannelStatus>,
    },
    Error {
        message: String,
    },
}

/// Action requested by a downstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Subscribe,
    Unsubscribe,
}

/// Inbound request from a downstream session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub action: ClientAction,
    pub product: String,
}

/// Outbound message to a downstream session, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Identity announcement, sent once on connect.
    #[serde(rename_all = "camelCase")]
    UserId { user_id: String },
    /// Current subscription set announcement.
    Subscriptions { products: Vec<ProductId> },
    /// Book update for one subscribed product.
    Price { product: ProductId, data: BookSnapshot },
    /// Trade print for one subscribed product.
    Match { product: ProductId, data: TradePrint },
    /// Feed-wide channel confirmation, sent to all sessions.
    Channels { data: Vec<ChannelStatus> },
}
