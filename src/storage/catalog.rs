//! Async [`Catalog`] over the blocking `SQLite` store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::sqlite::{InventoryStore, StorageError, StorageResult};
use crate::model::types::{GroupId, Inventory, Item};
use crate::search::catalog::{Catalog, CatalogError, CatalogResult, DataChange};

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        CatalogError::Storage(err.to_string())
    }
}

/// Shares one [`InventoryStore`] between the engine and writers; each call
/// runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteCatalog {
    store: Arc<Mutex<InventoryStore>>,
}

impl SqliteCatalog {
    pub fn new(store: InventoryStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::new(InventoryStore::open(path)?))
    }

    /// Direct handle for writers (imports, CRUD from the UI).
    pub fn store(&self) -> Arc<Mutex<InventoryStore>> {
        self.store.clone()
    }

    async fn blocking<T, F>(&self, f: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut InventoryStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&mut store.lock()))
            .await
            .map_err(|e| CatalogError::Join(e.to_string()))?
            .map_err(CatalogError::from)
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn snapshot(&self) -> CatalogResult<Inventory> {
        self.blocking(|store| store.load_inventory()).await
    }

    async fn find_by_name_or_code(&self, text: &str) -> CatalogResult<Vec<Item>> {
        let text = text.to_string();
        self.blocking(move |store| store.find_by_name_or_code(&text))
            .await
    }

    async fn find_by_cross_entity_match(&self, text: &str) -> CatalogResult<Vec<Item>> {
        let text = text.to_string();
        self.blocking(move |store| store.find_products_by_ingredient(&text))
            .await
    }

    async fn set_collapsed(&self, group: GroupId, collapsed: bool) -> CatalogResult<()> {
        self.blocking(move |store| store.set_collapsed(group, collapsed))
            .await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DataChange>> {
        Some(self.store.lock().subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::{IngredientUse, NewIngredient, NewProduct};

    #[tokio::test]
    async fn lookups_run_against_the_store() {
        let catalog = SqliteCatalog::new(InventoryStore::open_in_memory().unwrap());
        {
            let store = catalog.store();
            let mut store = store.lock();
            store
                .insert_ingredient(&NewIngredient {
                    code: Some("978000000017".into()),
                    ..NewIngredient::named("Sugar")
                })
                .unwrap();
            store
                .insert_product(&NewProduct {
                    ingredients: vec![IngredientUse {
                        code: "978000000017".into(),
                        quantity_used: 1.0,
                    }],
                    ..NewProduct::named("Fudge")
                })
                .unwrap();
        }

        let names = catalog.find_by_name_or_code("sug").await.unwrap();
        assert_eq!(names.len(), 1);
        let products = catalog.find_by_cross_entity_match("sugar").await.unwrap();
        assert_eq!(products[0].name, "Fudge");

        let group = catalog.snapshot().await.unwrap().groups[0].id;
        catalog.set_collapsed(group, false).await.unwrap();
        assert!(!catalog.snapshot().await.unwrap().groups[0].collapsed);
    }

    #[tokio::test]
    async fn subscribers_see_writes() {
        let catalog = SqliteCatalog::new(InventoryStore::open_in_memory().unwrap());
        let mut rx = catalog.subscribe().unwrap();
        catalog
            .store()
            .lock()
            .insert_ingredient(&NewIngredient::named("Salt"))
            .unwrap();
        assert!(matches!(rx.recv().await.unwrap(), DataChange::Inserted(_)));
    }

    #[tokio::test]
    async fn storage_errors_map_to_catalog_errors() {
        let catalog = SqliteCatalog::new(InventoryStore::open_in_memory().unwrap());
        let err = catalog
            .set_collapsed(GroupId(42), true)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Storage(_)));
    }
}
