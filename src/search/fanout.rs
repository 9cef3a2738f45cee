//! Query fan-out/fan-in.
//!
//! One resolution classifies the query, serves what it can from the cache,
//! issues the remaining collaborator lookups concurrently and unions every
//! contribution with the local direct-field matches. A failed or timed-out
//! lookup is logged and contributes nothing; it never fails the resolution.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::cache::{MatchSet, ResultCache};
use super::catalog::{Catalog, CatalogError, CatalogResult, SourceKind};
use super::classify::QueryClass;
use super::generation::{Generation, GenerationLedger};
use super::local::local_matches;
use crate::model::types::{Inventory, Item, ItemId};

/// Matching item ids for one generation. Never mutated once built.
#[derive(Debug, Clone)]
pub struct VisibilitySet {
    generation: Generation,
    query: String,
    ids: Arc<HashSet<ItemId>>,
}

impl VisibilitySet {
    pub fn new(generation: Generation, query: impl Into<String>, ids: HashSet<ItemId>) -> Self {
        Self {
            generation,
            query: query.into(),
            ids: Arc::new(ids),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &HashSet<ItemId> {
        &self.ids
    }
}

/// Outcome of a resolution. `Stale` must not be applied.
#[derive(Debug, Clone)]
pub enum Resolution {
    Current(VisibilitySet),
    Stale,
}

pub struct QueryResolver {
    catalog: Arc<dyn Catalog>,
    cache: Arc<Mutex<ResultCache>>,
    ledger: Arc<GenerationLedger>,
    source_timeout: Duration,
}

impl QueryResolver {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        cache: Arc<Mutex<ResultCache>>,
        ledger: Arc<GenerationLedger>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            ledger,
            source_timeout,
        }
    }

    pub async fn resolve(
        &self,
        query: &str,
        generation: Generation,
        inventory: &Inventory,
    ) -> Resolution {
        let start = Instant::now();
        let class = QueryClass::of(query);
        let text = query.trim().to_string();
        let mut merged = local_matches(inventory, &text);
        let local_count = merged.len();

        // Answers issued before a data-change clear must not be cached after it.
        let epoch = self.cache.lock().epoch();
        let mut tasks: JoinSet<(SourceKind, CatalogResult<Vec<Item>>)> = JoinSet::new();
        for &source in class.sources() {
            let cached = self.cache.lock().get(&text, source);
            if let Some(hit) = cached {
                debug!(%generation, %source, count = hit.len(), "cache hit");
                merged.extend(hit.iter().copied());
                continue;
            }
            let catalog = self.catalog.clone();
            let text = text.clone();
            let timeout = self.source_timeout;
            tasks.spawn(async move {
                let issued = Instant::now();
                let result = match tokio::time::timeout(timeout, catalog.lookup(source, &text)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(CatalogError::Timeout {
                        kind: source,
                        elapsed_ms: issued.elapsed().as_millis() as u64,
                    }),
                };
                (source, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(items))) => {
                    let ids: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
                    debug!(%generation, %source, count = ids.len(), "sub-query resolved");
                    merged.extend(ids.iter().copied());
                    let matches: MatchSet = Arc::new(ids);
                    if !self.cache.lock().put_if_epoch(epoch, &text, source, matches) {
                        debug!(%generation, %source, "data changed mid-lookup; not cached");
                    }
                }
                Ok((source, Err(err))) => {
                    warn!(%generation, %source, query = %text, error = %err, "sub-query failed");
                }
                Err(err) => {
                    warn!(%generation, query = %text, error = %err, "sub-query task failed");
                }
            }
        }

        if !self.ledger.is_current(generation) {
            debug!(%generation, query = %text, "resolution superseded");
            return Resolution::Stale;
        }

        debug!(
            %generation,
            query = %text,
            class = ?class,
            local = local_count,
            total = merged.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "resolution complete"
        );
        Resolution::Current(VisibilitySet::new(generation, text, merged))
    }
}
