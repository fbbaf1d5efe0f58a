use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;

/// Upper bound on cached URLs; `?page=` and arbitrary query strings are keys too.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Time-boxed cache of rendered pages, keyed by request URL.
///
/// Entries are never invalidated by writes elsewhere in the application; they
/// only disappear when they expire or when [`PageCache::clear`] is called.
/// Every `put` sweeps expired entries, and a full cache evicts the entry
/// closest to expiry.
#[derive(Clone)]
pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    entries: Arc<RwLock<HashMap<String, CachedPage>>>,
}

#[derive(Clone)]
struct CachedPage {
    body: Bytes,
    expires_at: DateTime<Utc>,
}

impl PageCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_max_entries(ttl, DEFAULT_MAX_ENTRIES, clock)
    }

    pub fn with_max_entries(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        PageCache {
            ttl,
            max_entries: max_entries.max(1),
            clock,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                Some(page) if page.expires_at > now => return Some(page.body.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it unless another request already repopulated the key
        let mut guard = self.entries.write().await;
        if guard.get(key).is_some_and(|page| page.expires_at <= now) {
            guard.remove(key);
            debug!("Page cache entry expired: {}", key);
        }
        None
    }

    pub async fn put(&self, key: impl Into<String>, body: Bytes) {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let key = key.into();
        let mut guard = self.entries.write().await;

        let before = guard.len();
        guard.retain(|_, page| page.expires_at > now);
        if guard.len() < before {
            debug!("Swept {} expired page cache entries", before - guard.len());
        }

        if guard.len() >= self.max_entries && !guard.contains_key(&key) {
            let soonest = guard
                .iter()
                .min_by_key(|(_, page)| page.expires_at)
                .map(|(candidate, _)| candidate.clone());
            if let Some(evicted) = soonest {
                guard.remove(&evicted);
                debug!("Page cache full, evicted: {}", evicted);
            }
        }

        guard.insert(key, CachedPage { body, expires_at });
    }

    pub async fn clear(&self) {
        let mut guard = self.entries.write().await;
        guard.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
