use async_trait::async_trait;
use inventory_search::model::types::{Group, GroupId, Inventory, Item, ItemId, ItemKind};
use inventory_search::search::catalog::{
    Catalog, CatalogError, CatalogResult, DataChange, SourceKind,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Scriptable in-memory catalog: per-text delays, failing sources, canned
/// cross-entity answers, and a log of every call it received. Answers reflect
/// the data at call time, even when the reply is delayed.
#[allow(dead_code)]
pub struct MemoryCatalog {
    inventory: Mutex<Inventory>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<SourceKind>>,
    cross: Mutex<HashMap<String, Vec<ItemId>>>,
    calls: Mutex<Vec<(SourceKind, String)>>,
    collapse_writes: Mutex<Vec<(GroupId, bool)>>,
    changes: broadcast::Sender<DataChange>,
}

#[allow(dead_code)]
impl MemoryCatalog {
    pub fn new(inventory: Inventory) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            inventory: Mutex::new(inventory),
            delays: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            cross: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            collapse_writes: Mutex::new(Vec::new()),
            changes,
        })
    }

    pub fn delay(&self, text: &str, delay: Duration) {
        self.delays.lock().insert(text.to_lowercase(), delay);
    }

    pub fn clear_delay(&self, text: &str) {
        self.delays.lock().remove(&text.to_lowercase());
    }

    pub fn fail(&self, source: SourceKind) {
        self.failing.lock().insert(source);
    }

    pub fn script_cross(&self, text: &str, ids: &[i64]) {
        self.cross
            .lock()
            .insert(text.to_lowercase(), ids.iter().map(|&id| ItemId(id)).collect());
    }

    pub fn calls(&self) -> Vec<(SourceKind, String)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, source: SourceKind, text: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(s, t)| *s == source && t == text)
            .count()
    }

    pub fn collapse_writes(&self) -> Vec<(GroupId, bool)> {
        self.collapse_writes.lock().clone()
    }

    /// Swap the data and notify subscribers.
    pub fn replace_inventory(&self, inventory: Inventory) {
        *self.inventory.lock() = inventory;
        let _ = self.changes.send(DataChange::Bulk);
    }

    async fn enter(&self, source: SourceKind, text: &str) -> CatalogResult<()> {
        self.calls.lock().push((source, text.to_string()));
        let delay = self.delays.lock().get(&text.to_lowercase()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&source) {
            return Err(CatalogError::Unavailable(format!("{source} is down")));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn snapshot(&self) -> CatalogResult<Inventory> {
        Ok(self.inventory.lock().clone())
    }

    async fn find_by_name_or_code(&self, text: &str) -> CatalogResult<Vec<Item>> {
        let needle = text.to_lowercase();
        let answer: Vec<Item> = self
            .inventory
            .lock()
            .items
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains(&needle)
                    || item.code.to_lowercase().starts_with(&needle)
            })
            .cloned()
            .collect();
        self.enter(SourceKind::NameOrCode, text).await?;
        Ok(answer)
    }

    async fn find_by_cross_entity_match(&self, text: &str) -> CatalogResult<Vec<Item>> {
        let ids = self
            .cross
            .lock()
            .get(&text.to_lowercase())
            .cloned()
            .unwrap_or_default();
        let answer: Vec<Item> = {
            let inventory = self.inventory.lock();
            ids.into_iter()
                .map(|id| {
                    inventory
                        .item(id)
                        .cloned()
                        .unwrap_or_else(|| Item::new(id.0, ItemKind::Product, ""))
                })
                .collect()
        };
        self.enter(SourceKind::CrossEntity, text).await?;
        Ok(answer)
    }

    async fn set_collapsed(&self, group: GroupId, collapsed: bool) -> CatalogResult<()> {
        self.collapse_writes.lock().push((group, collapsed));
        let mut inventory = self.inventory.lock();
        if let Some(g) = inventory.groups.iter_mut().find(|g| g.id == group) {
            g.collapsed = collapsed;
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DataChange>> {
        Some(self.changes.subscribe())
    }
}

#[allow(dead_code)]
pub fn item(id: i64, name: &str) -> Item {
    Item::new(id, ItemKind::Ingredient, name)
}

#[allow(dead_code)]
pub fn group(id: i64, name: &str, members: &[i64], collapsed: bool) -> Group {
    Group {
        id: GroupId(id),
        name: name.to_string(),
        members: members.iter().map(|&m| ItemId(m)).collect(),
        collapsed,
    }
}
