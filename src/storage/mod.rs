//! Persistent inventory store and its [`Catalog`](crate::search::catalog::Catalog) adapter.

pub mod catalog;
pub mod sqlite;

pub use catalog::SqliteCatalog;
pub use sqlite::{InventoryStore, StorageError, StorageResult};
