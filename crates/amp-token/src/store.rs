//! # Token Store Boundary
//!
//! Tokens live in a keyed store with an expiry sweep. The in-memory
//! implementation serves the reference deployment and tests; production
//! swaps in any durable, TTL-capable store behind the same trait.

use std::collections::HashMap;
use std::sync::Mutex;

use amp_core::Timestamp;

use crate::issuer::AuthorizationToken;

/// Keyed token storage, swappable for a durable TTL-capable backend.
pub trait TokenStore: Send + Sync {
    /// Look up a token by its value.
    fn get(&self, value: &str) -> Option<AuthorizationToken>;

    /// Store a token under its value.
    fn put(&self, token: AuthorizationToken);

    /// Remove a token; returns whether it was present.
    fn delete(&self, value: &str) -> bool;

    /// Drop all tokens expired as of `now`; returns how many were removed.
    fn sweep_expired(&self, now: &Timestamp) -> usize;
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, AuthorizationToken>>,
}

impl InMemoryTokenStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, value: &str) -> Option<AuthorizationToken> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(value)
            .cloned()
    }

    fn put(&self, token: AuthorizationToken) {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.value.clone(), token);
    }

    fn delete(&self, value: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(value)
            .is_some()
    }

    fn sweep_expired(&self, now: &Timestamp) -> usize {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > *now);
        before - tokens.len()
    }
}
