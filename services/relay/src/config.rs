//! Relay configuration
//!
//! Plain config structs with defaults matching the production feed setup;
//! a handful of environment variables override them at startup.

use std::net::SocketAddr;
use std::time::Duration;

use types::ids::ProductId;

/// Default upstream feed endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// Default product catalog.
pub const DEFAULT_PRODUCTS: [&str; 4] = ["BTC-USD", "ETH-USD", "XRP-USD", "LTC-USD"];

/// Identity assignment policy for downstream sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityScheme {
    /// Friendly-name pool with reuse after disconnect.
    NamePool,
    /// Opaque UUID v7 token per connection.
    Token,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream feed WebSocket URL.
    pub upstream_url: String,
    /// Downstream listen address.
    pub listen_addr: SocketAddr,
    /// Fixed product catalog, immutable for the process lifetime.
    pub products: Vec<ProductId>,
    /// Delay between reconnect attempts after upstream loss. Fixed, no
    /// backoff and no attempt cap: the feed is assumed eventually reachable
    /// and no user-facing request is waiting on it.
    pub reconnect_delay: Duration,
    /// Per-product trade ring capacity.
    pub trade_history_capacity: usize,
    /// Per-session outbound buffer; deliveries beyond it are skipped.
    pub session_buffer: usize,
    /// Identity assignment policy.
    pub identity_scheme: IdentityScheme,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            listen_addr: "0.0.0.0:4000".parse().expect("valid default address"),
            products: DEFAULT_PRODUCTS.iter().map(|p| ProductId::new(*p)).collect(),
            reconnect_delay: Duration::from_secs(2),
            trade_history_capacity: crate::trades::DEFAULT_CAPACITY,
            session_buffer: 64,
            identity_scheme: IdentityScheme::NamePool,
        }
    }
}

impl RelayConfig {
    /// Build a config from defaults plus environment overrides.
    ///
    /// Recognized variables: `RELAY_UPSTREAM_URL`, `RELAY_LISTEN_ADDR`,
    /// `RELAY_PRODUCTS` (comma-separated), `RELAY_IDENTITY`
    /// (`names`/`token`).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RELAY_UPSTREAM_URL") {
            config.upstream_url = url;
        }
        if let Ok(addr) = std::env::var("RELAY_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }
        if let Ok(products) = std::env::var("RELAY_PRODUCTS") {
            let parsed: Vec<ProductId> = products
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ProductId::new)
                .collect();
            if !parsed.is_empty() {
                config.products = parsed;
            }
        }
        if let Ok(scheme) = std::env::var("RELAY_IDENTITY") {
            if scheme.eq_ignore_ascii_case("token") {
                config.identity_scheme = IdentityScheme::Token;
            }
        }

        config
    }
}
