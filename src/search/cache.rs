//! Short-lived memoization of resolved sub-query match sets.
//!
//! Keys are `(normalized query, source)`. Entries are immutable; an entry whose
//! age has reached the TTL is treated as absent and evicted lazily on the next
//! lookup of that key.
//!
//! Every [`ResultCache::clear`] starts a new epoch. A lookup issued before a
//! clear must not write its answer back afterwards; callers record
//! [`ResultCache::epoch`] before issuing and store through
//! [`ResultCache::put_if_epoch`].

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use super::catalog::SourceKind;
use crate::model::types::ItemId;

/// Matches for one `(query, source)` pair, shared without copying.
pub type MatchSet = Arc<HashSet<ItemId>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    matches: MatchSet,
    created_at: Instant,
}

/// Trim and case-fold query text before it is used as a key.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

pub struct ResultCache {
    entries: LruCache<(String, SourceKind), CacheEntry>,
    ttl: Duration,
    epoch: u64,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
            ttl,
            epoch: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, query: &str, source: SourceKind) -> Option<MatchSet> {
        let key = (normalize_query(query), source);
        let expired = match self.entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                self.hits += 1;
                return Some(entry.matches.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(&key);
        }
        self.misses += 1;
        None
    }

    /// Store a freshly resolved match set, replacing any previous entry.
    pub fn put(&mut self, query: &str, source: SourceKind, matches: MatchSet) {
        let entry = CacheEntry {
            matches,
            created_at: Instant::now(),
        };
        self.entries.put((normalize_query(query), source), entry);
    }

    /// Store `matches` only if no clear happened since `epoch` was read.
    /// Returns whether the entry was stored.
    pub fn put_if_epoch(
        &mut self,
        epoch: u64,
        query: &str,
        source: SourceKind,
        matches: MatchSet,
    ) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.put(query, source, matches);
        true
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every entry and start a new epoch; called when the underlying
    /// data changed.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }

    /// Physically stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
