//! Best-effort idempotency cache.
//!
//! Deduplicates rapid-fire notification sends across retries. This is an
//! advisory, single-instance mechanism with no crash durability; running
//! multiple instances requires backing the trait with an external store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Records `key` with the given TTL. Returns `true` if the key was
    /// absent (or expired), `false` if a live entry already exists.
    async fn put_if_absent(&self, key: &str, ttl: Duration) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    entries: RwLock<HashMap<String, Instant>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn put_if_absent(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        // Lazy expiry keeps the map bounded by the live key set.
        entries.retain(|_, expires_at| *expires_at > now);
        match entries.get(key) {
            Some(_) => false,
            None => {
                entries.insert(key.to_string(), now + ttl);
                true
            }
        }
    }
}
