//! Market Data Relay
//!
//! Mirrors one upstream exchange feed and fans it out to subscribed
//! WebSocket sessions:
//! - Persistent upstream connection with fixed-delay reconnect
//! - Level-2 order book mirrors (snapshot replace + diff apply)
//! - Bounded recent-trade history per product
//! - Ref-counted aggregate subscription interest driving upstream
//!   subscribe/unsubscribe
//! - Subscription-scoped fan-out that skips slow sessions
//! - Pluggable session identity and subscription persistence
//!
//! # Architecture
//!
//! ```text
//! Upstream Feed (wss)
//!        │
//!   ┌────▼─────┐   FeedCommand    ┌────────┐
//!   │Connector │◄─────────────────┤        │
//!   └────┬─────┘                  │        │
//!        │ EngineEvent            │ Engine │
//!        └───────────────────────►│        │
//!                                 │        │
//!   ┌──────────┐  EngineEvent     │        │
//!   │ Session  ├─────────────────►│        │
//!   │  tasks   │◄─────────────────┤        │
//!   └────▲─────┘  ServerMessage   └────────┘
//!        │
//! Downstream WebSocket clients
//! ```
//!
//! All mutable state lives in the engine; transports talk to it only
//! through channels.

pub mod book;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod protocol;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod trades;
pub mod ws;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
