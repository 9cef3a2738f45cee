//! `SQLite` backend: schema, pragmas, inventory CRUD and the two lookups the
//! search fan-out issues.

use crate::model::barcode;
use crate::model::types::{Group, GroupId, Inventory, Item, ItemId, ItemKind};
use crate::search::catalog::DataChange;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid inventory document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Item {0} not found")]
    NotFound(ItemId),

    #[error("No ingredient with code {0}")]
    UnknownIngredient(String),

    #[error("Invalid item: {0}")]
    Invalid(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

const SCHEMA_VERSION: i64 = 1;

/// Data-change notifications buffered per subscriber before it lags.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

const DATE_FORMAT: &str = "%Y-%m-%d";

const MIGRATION_V1: &str = r"
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('ingredient', 'product')),
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    supplier TEXT,
    quantity REAL,
    unit_cost REAL,
    purchase_date TEXT,
    expiration_date TEXT,
    date_mixed TEXT,
    batch TEXT,
    flagged INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS product_ingredients (
    product_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    ingredient_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    quantity_used REAL NOT NULL,
    UNIQUE (product_id, ingredient_id)
);

CREATE TABLE IF NOT EXISTS group_state (
    group_id INTEGER PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
    collapsed INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
CREATE INDEX IF NOT EXISTS idx_product_ingredients_ingredient ON product_ingredients(ingredient_id);
";

/// A product reads as flagged when any ingredient it uses is flagged.
const ITEM_COLUMNS: &str = "id, kind, code, name, supplier, quantity, unit_cost, \
                            purchase_date, expiration_date, date_mixed, \
                            (flagged OR EXISTS (
                                SELECT 1 FROM product_ingredients fpi
                                JOIN items fi ON fi.id = fpi.ingredient_id
                                WHERE fpi.product_id = items.id AND fi.flagged = 1
                            )) AS flagged";

/// Fields for a new ingredient. A missing code is generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewIngredient {
    pub name: String,
    pub code: Option<String>,
    pub supplier: Option<String>,
    pub quantity: Option<f64>,
    pub unit_cost: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

impl NewIngredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One ingredient consumed by a product, referenced by its code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientUse {
    pub code: String,
    pub quantity_used: f64,
}

/// Fields for a new product. Missing code and batch are generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewProduct {
    pub name: String,
    pub code: Option<String>,
    pub batch: Option<String>,
    pub date_mixed: Option<NaiveDate>,
    pub quantity: Option<f64>,
    pub unit_cost: Option<f64>,
    pub ingredients: Vec<IngredientUse>,
}

impl NewProduct {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Editable ingredient fields. The code never changes once assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngredientUpdate {
    pub name: String,
    pub supplier: Option<String>,
    pub quantity: Option<f64>,
    pub unit_cost: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

/// Editable product fields. `ingredients` replaces every current use and
/// must not be empty; a missing mixed date means today.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: String,
    pub date_mixed: Option<NaiveDate>,
    pub quantity: Option<f64>,
    pub ingredients: Vec<IngredientUse>,
}

/// Bulk import document accepted by [`InventoryStore::import_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventoryDocument {
    pub ingredients: Vec<NewIngredient>,
    pub products: Vec<NewProduct>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub ingredients: usize,
    pub products: usize,
}

pub struct InventoryStore {
    conn: Connection,
    changes: broadcast::Sender<DataChange>,
}

impl InventoryStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let start = Instant::now();
        let mut conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        migrate(&mut conn)?;
        info!(
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "opened inventory store"
        );
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { conn, changes }
    }

    /// Receive a notification after every data mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.changes.subscribe()
    }

    fn publish(&self, change: DataChange) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }

    pub fn schema_version(&self) -> StorageResult<i64> {
        let version: i64 = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(version)
    }

    pub fn insert_ingredient(&mut self, new: &NewIngredient) -> StorageResult<ItemId> {
        let id = insert_ingredient_row(&self.conn, new)?;
        debug!(%id, name = %new.name, "ingredient inserted");
        self.publish(DataChange::Inserted(id.0));
        Ok(id)
    }

    /// Insert a product and its ingredient uses in one transaction.
    pub fn insert_product(&mut self, new: &NewProduct) -> StorageResult<ItemId> {
        let tx = self.conn.transaction()?;
        let id = insert_product_row(&tx, new)?;
        tx.commit()?;
        debug!(%id, name = %new.name, uses = new.ingredients.len(), "product inserted");
        self.publish(DataChange::Inserted(id.0));
        Ok(id)
    }

    /// Delete an item. Ingredient uses and collapse state cascade.
    pub fn delete_item(&mut self, id: ItemId) -> StorageResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1", params![id.0])?;
        if removed == 0 {
            return Err(StorageError::NotFound(id));
        }
        debug!(%id, "item deleted");
        self.publish(DataChange::Deleted(id.0));
        Ok(())
    }

    /// Rewrite an ingredient's editable fields. Its code is kept.
    pub fn update_ingredient(&mut self, id: ItemId, update: &IngredientUpdate) -> StorageResult<()> {
        let name = validated_name(&update.name)?;
        let updated = self.conn.execute(
            "UPDATE items SET name = ?2, supplier = ?3, quantity = ?4, unit_cost = ?5,
                              purchase_date = ?6, expiration_date = ?7
             WHERE id = ?1 AND kind = 'ingredient'",
            params![
                id.0,
                name,
                update.supplier,
                update.quantity,
                update.unit_cost,
                update.purchase_date.map(format_date),
                update.expiration_date.map(format_date),
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        debug!(%id, name, "ingredient updated");
        self.publish(DataChange::Updated(id.0));
        Ok(())
    }

    /// Rewrite a product and replace its ingredient uses in one transaction.
    pub fn update_product(&mut self, id: ItemId, update: &ProductUpdate) -> StorageResult<()> {
        let name = validated_name(&update.name)?;
        if update.ingredients.is_empty() {
            return Err(StorageError::Invalid(
                "a product needs at least one ingredient".into(),
            ));
        }
        let date_mixed = update.date_mixed.unwrap_or_else(|| Utc::now().date_naive());

        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE items SET name = ?2, date_mixed = ?3, quantity = ?4
             WHERE id = ?1 AND kind = 'product'",
            params![id.0, name, format_date(date_mixed), update.quantity],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        tx.execute(
            "DELETE FROM product_ingredients WHERE product_id = ?1",
            params![id.0],
        )?;
        insert_uses(&tx, id.0, &update.ingredients)?;
        tx.commit()?;

        debug!(%id, name, uses = update.ingredients.len(), "product updated");
        self.publish(DataChange::Updated(id.0));
        Ok(())
    }

    /// Add `delta` to a product's amount, never going below zero. Returns
    /// the new amount.
    pub fn adjust_product_amount(&mut self, id: ItemId, delta: f64) -> StorageResult<f64> {
        let current: Option<f64> = self
            .conn
            .query_row(
                "SELECT quantity FROM items WHERE id = ?1 AND kind = 'product'",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::NotFound(id))?;
        self.set_product_amount(id, current.unwrap_or(0.0) + delta)
    }

    /// Set a product's amount, clamped at zero. Returns the stored amount.
    pub fn set_product_amount(&mut self, id: ItemId, amount: f64) -> StorageResult<f64> {
        let amount = amount.max(0.0);
        let updated = self.conn.execute(
            "UPDATE items SET quantity = ?2 WHERE id = ?1 AND kind = 'product'",
            params![id.0, amount],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        debug!(%id, amount, "product amount set");
        self.publish(DataChange::Updated(id.0));
        Ok(amount)
    }

    /// Whether any ingredient used by `product` is flagged.
    pub fn product_has_flagged_ingredients(&self, product: ItemId) -> StorageResult<bool> {
        let flagged: bool = self.conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM product_ingredients pi
                 JOIN items i ON i.id = pi.ingredient_id
                 WHERE pi.product_id = ?1 AND i.flagged = 1
             )",
            params![product.0],
            |row| row.get(0),
        )?;
        Ok(flagged)
    }

    pub fn flag_item(&mut self, id: ItemId) -> StorageResult<()> {
        self.set_flagged(id, true)
    }

    pub fn unflag_item(&mut self, id: ItemId) -> StorageResult<()> {
        self.set_flagged(id, false)
    }

    fn set_flagged(&mut self, id: ItemId, flagged: bool) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE items SET flagged = ?2 WHERE id = ?1",
            params![id.0, flagged],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(id));
        }
        self.publish(DataChange::Updated(id.0));
        Ok(())
    }

    /// Persist a user collapse toggle. Not a data change: no notification.
    pub fn set_collapsed(&mut self, group: GroupId, collapsed: bool) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO group_state(group_id, collapsed) VALUES(?1, ?2)
             ON CONFLICT(group_id) DO UPDATE SET collapsed = excluded.collapsed",
            params![group.0, collapsed],
        )?;
        Ok(())
    }

    /// Everything the views render. Each product is a group of the
    /// ingredients it uses; groups without saved state start collapsed.
    pub fn load_inventory(&self) -> StorageResult<Inventory> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY name COLLATE NOCASE, id"
        ))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut members: HashMap<i64, Vec<ItemId>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT product_id, ingredient_id FROM product_ingredients ORDER BY product_id, rowid",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (product, ingredient) = row?;
            members.entry(product).or_default().push(ItemId(ingredient));
        }

        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, COALESCE(gs.collapsed, 1)
             FROM items p LEFT JOIN group_state gs ON gs.group_id = p.id
             WHERE p.kind = 'product'
             ORDER BY p.name COLLATE NOCASE, p.id",
        )?;
        let groups = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok(Group {
                    id: GroupId(id),
                    name: row.get(1)?,
                    members: members.get(&id).cloned().unwrap_or_default(),
                    collapsed: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Inventory { items, groups })
    }

    /// Items whose name contains `text` (case-insensitive) or whose code
    /// starts with it.
    pub fn find_by_name_or_code(&self, text: &str) -> StorageResult<Vec<Item>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = like_escape(text);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE name LIKE ?1 ESCAPE '\\' OR code LIKE ?2 ESCAPE '\\'
             ORDER BY name COLLATE NOCASE, id"
        ))?;
        let items = stmt
            .query_map(
                params![format!("%{escaped}%"), format!("{escaped}%")],
                row_to_item,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Products using an ingredient whose name contains `text` or whose code
    /// starts with it.
    pub fn find_products_by_ingredient(&self, text: &str) -> StorageResult<Vec<Item>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = like_escape(text);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE id IN (
                 SELECT pi.product_id FROM product_ingredients pi
                 JOIN items i ON i.id = pi.ingredient_id
                 WHERE i.name LIKE ?1 ESCAPE '\\' OR i.code LIKE ?2 ESCAPE '\\'
             )
             ORDER BY name COLLATE NOCASE, id"
        ))?;
        let items = stmt
            .query_map(
                params![format!("%{escaped}%"), format!("{escaped}%")],
                row_to_item,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn item_count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Load a JSON [`InventoryDocument`] in one transaction. Products may
    /// reference ingredients from the same document by code. Publishes a
    /// single [`DataChange::Bulk`].
    pub fn import_json(&mut self, json: &str) -> StorageResult<ImportSummary> {
        let doc: InventoryDocument = serde_json::from_str(json)?;
        let start = Instant::now();
        let tx = self.conn.transaction()?;
        for ingredient in &doc.ingredients {
            insert_ingredient_row(&tx, ingredient)?;
        }
        for product in &doc.products {
            insert_product_row(&tx, product)?;
        }
        tx.commit()?;

        let summary = ImportSummary {
            ingredients: doc.ingredients.len(),
            products: doc.products.len(),
        };
        info!(
            ingredients = summary.ingredients,
            products = summary.products,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inventory imported"
        );
        self.publish(DataChange::Bulk);
        Ok(summary)
    }

    pub fn import_file(&mut self, path: &Path) -> StorageResult<ImportSummary> {
        let json = fs::read_to_string(path)?;
        self.import_json(&json)
    }
}

fn insert_ingredient_row(conn: &Connection, new: &NewIngredient) -> StorageResult<ItemId> {
    let name = validated_name(&new.name)?;
    let code = new
        .code
        .clone()
        .unwrap_or_else(|| barcode::ingredient_code(&mut rand::thread_rng()));
    conn.execute(
        "INSERT INTO items(kind, code, name, supplier, quantity, unit_cost,
                           purchase_date, expiration_date, created_at)
         VALUES('ingredient', ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            code,
            name,
            new.supplier,
            new.quantity,
            new.unit_cost,
            new.purchase_date.map(format_date),
            new.expiration_date.map(format_date),
            Utc::now().timestamp_millis(),
        ],
    )?;
    Ok(ItemId(conn.last_insert_rowid()))
}

fn insert_product_row(conn: &Connection, new: &NewProduct) -> StorageResult<ItemId> {
    let name = validated_name(&new.name)?;
    let mut rng = rand::thread_rng();
    let now_ms = Utc::now().timestamp_millis();
    let code = new
        .code
        .clone()
        .unwrap_or_else(|| barcode::product_code(&mut rng, now_ms));
    let batch = new
        .batch
        .clone()
        .unwrap_or_else(|| barcode::batch_number(&mut rng));
    let date_mixed = new.date_mixed.unwrap_or_else(|| Utc::now().date_naive());

    conn.execute(
        "INSERT INTO items(kind, code, name, quantity, unit_cost, date_mixed, batch, created_at)
         VALUES('product', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            code,
            name,
            new.quantity,
            new.unit_cost,
            format_date(date_mixed),
            batch,
            now_ms,
        ],
    )?;
    let product_id = conn.last_insert_rowid();
    insert_uses(conn, product_id, &new.ingredients)?;
    Ok(ItemId(product_id))
}

/// Record ingredient uses by code. Repeated codes add up.
fn insert_uses(conn: &Connection, product_id: i64, uses: &[IngredientUse]) -> StorageResult<()> {
    for usage in uses {
        let ingredient_id: i64 = conn
            .query_row(
                "SELECT id FROM items WHERE code = ?1 AND kind = 'ingredient'",
                params![usage.code],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::UnknownIngredient(usage.code.clone()))?;
        conn.execute(
            "INSERT INTO product_ingredients(product_id, ingredient_id, quantity_used)
             VALUES(?1, ?2, ?3)
             ON CONFLICT(product_id, ingredient_id)
             DO UPDATE SET quantity_used = quantity_used + excluded.quantity_used",
            params![product_id, ingredient_id, usage.quantity_used],
        )?;
    }
    Ok(())
}

fn validated_name(name: &str) -> StorageResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StorageError::Invalid("name must not be empty".into()));
    }
    Ok(name)
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let kind: String = row.get(1)?;
    let kind = ItemKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, "unknown item kind".into())
    })?;
    let dates = [7, 8, 9]
        .into_iter()
        .filter_map(|idx| row.get::<_, Option<String>>(idx).ok().flatten())
        .filter_map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
        .collect();
    Ok(Item {
        id: ItemId(row.get(0)?),
        kind,
        code: row.get(2)?,
        name: row.get(3)?,
        supplier: row.get(4)?,
        quantity: row.get(5)?,
        unit_cost: row.get(6)?,
        dates,
        flagged: row.get(10)?,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Escape `LIKE` wildcards so user text matches literally.
fn like_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn apply_pragmas(conn: &Connection) -> StorageResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

fn migrate(conn: &mut Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    let current: i64 = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if current == SCHEMA_VERSION {
        return Ok(());
    }
    if current > SCHEMA_VERSION {
        return Err(StorageError::Invalid(format!(
            "schema version {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(MIGRATION_V1)?;
    tx.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;
    info!(from = current, to = SCHEMA_VERSION, "migrated inventory schema");
    Ok(())
}
