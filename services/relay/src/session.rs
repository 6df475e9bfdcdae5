//! Session lifecycle and identity assignment
//!
//! Each downstream connection gets a process-unique `SessionId` and a
//! user-facing identity string from a pluggable generator. Two policies are
//! provided: a friendly-name pool that recycles names after disconnect
//! (falling back to counter-suffixed names when the pool is exhausted), and
//! an opaque UUID v7 token per connection.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;
use types::ids::IdentityToken;

/// Unique session identifier, stable for the connection's lifetime.
pub type SessionId = u64;

/// Pluggable identity assignment policy.
pub trait IdentityGenerator: Send {
    /// Assign a fresh identity, unique among identities currently in use.
    fn assign(&mut self) -> String;

    /// Retire an identity after its session disconnects.
    fn retire(&mut self, identity: &str);
}

/// Friendly-name pool with reuse after disconnect.
///
/// Hands out the first free name from the pool; once every name is in use,
/// appends an incrementing counter until an unused combination is found.
#[derive(Debug)]
pub struct NamePool {
    names: Vec<String>,
    in_use: BTreeSet<String>,
    counter: u64,
}

/// Default name pool seeded at startup.
pub const DEFAULT_NAMES: [&str; 10] = [
    "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry", "Ivy", "Jack",
];

impl NamePool {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            in_use: BTreeSet::new(),
            counter: 0,
        }
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new(DEFAULT_NAMES.iter().map(|n| n.to_string()).collect())
    }
}

impl IdentityGenerator for NamePool {
    fn assign(&mut self) -> String {
        if let Some(free) = self.names.iter().find(|n| !self.in_use.contains(*n)) {
            let name = free.clone();
            self.in_use.insert(name.clone());
            return name;
        }

        // All base names taken: suffix with a counter until unused.
        loop {
            self.counter += 1;
            let base = &self.names[(self.counter as usize) % self.names.len()];
            let candidate = format!("{}{}", base, self.counter);
            if self.in_use.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn retire(&mut self, identity: &str) {
        self.in_use.remove(identity);
    }
}

/// Opaque unique token per connection; nothing is recycled.
#[derive(Debug, Default)]
pub struct TokenGenerator;

impl IdentityGenerator for TokenGenerator {
    fn assign(&mut self) -> String {
        IdentityToken::new().to_string()
    }

    fn retire(&mut self, _identity: &str) {}
}

/// One live downstream session.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: String,
}

/// Tracks live sessions and drives the identity generator.
pub struct SessionTable {
    sessions: BTreeMap<SessionId, Session>,
    next_id: SessionId,
    identity: Box<dyn IdentityGenerator>,
}

impl SessionTable {
    pub fn new(identity: Box<dyn IdentityGenerator>) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_id: 1,
            identity,
        }
    }

    /// Register a new session and assign it a fresh identity.
    pub fn connect(&mut self) -> (SessionId, String) {
        let id = self.next_id;
        self.next_id += 1;
        let identity = self.identity.assign();
        self.sessions.insert(
            id,
            Session {
                identity: identity.clone(),
            },
        );
        info!(session = id, identity = %identity, "Session connected");
        (id, identity)
    }

    /// Remove a session and retire its identity.
    pub fn disconnect(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.identity.retire(&session.identity);
        info!(session = id, identity = %session.identity, "Session disconnected");
        Some(session)
    }

    /// The identity assigned to a session.
    pub fn identity_of(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id).map(|s| s.identity.as_str())
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
