//! Synchronous direct-field matching over the in-memory inventory.

use std::collections::HashSet;

use super::cache::normalize_query;
use crate::model::types::{Inventory, Item, ItemId};

/// Case-insensitive substring test against every direct-match field.
pub fn item_matches(item: &Item, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    item.match_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

pub fn local_matches(inventory: &Inventory, query: &str) -> HashSet<ItemId> {
    let needle = normalize_query(query);
    inventory
        .items
        .iter()
        .filter(|item| item_matches(item, &needle))
        .map(|item| item.id)
        .collect()
}
