//! Data collaborator seam.
//!
//! The engine never talks to storage directly; it asks a [`Catalog`] for the
//! inventory snapshot and for the two remote lookups it fans out to.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::types::{GroupId, Inventory, Item};

/// Remote lookup kinds the fan-out can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// Items whose name contains, or whose code starts with, the text.
    NameOrCode,
    /// Products using an ingredient whose name or code matches the text.
    CrossEntity,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NameOrCode => "name_or_code",
            Self::CrossEntity => "cross_entity",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that the underlying data changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChange {
    Inserted(i64),
    Updated(i64),
    Deleted(i64),
    Bulk,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("lookup task failed: {0}")]
    Join(String),
    #[error("{kind} lookup timed out after {elapsed_ms}ms")]
    Timeout { kind: SourceKind, elapsed_ms: u64 },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Full inventory for rendering.
    async fn snapshot(&self) -> CatalogResult<Inventory>;

    async fn find_by_name_or_code(&self, text: &str) -> CatalogResult<Vec<Item>>;

    async fn find_by_cross_entity_match(&self, text: &str) -> CatalogResult<Vec<Item>>;

    /// Persist a user collapse toggle. Never called for search-driven expansion.
    async fn set_collapsed(&self, group: GroupId, collapsed: bool) -> CatalogResult<()>;

    /// Data-changed notifications, if this catalog publishes them.
    fn subscribe(&self) -> Option<broadcast::Receiver<DataChange>> {
        None
    }

    /// Dispatch a lookup by source kind.
    async fn lookup(&self, source: SourceKind, text: &str) -> CatalogResult<Vec<Item>> {
        match source {
            SourceKind::NameOrCode => self.find_by_name_or_code(text).await,
            SourceKind::CrossEntity => self.find_by_cross_entity_match(text).await,
        }
    }
}
