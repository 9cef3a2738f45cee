//! Normalized inventory entities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Unique identifier of an item across every view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a container in the group view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Ingredient,
    Product,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingredient => "ingredient",
            Self::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingredient" => Some(Self::Ingredient),
            "product" => Some(Self::Product),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    /// Barcode or product code.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
    /// Purchase/expiry dates for ingredients, mix date for products.
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub flagged: bool,
}

impl Item {
    /// Minimal constructor used by fixtures and imports.
    pub fn new(id: i64, kind: ItemKind, name: impl Into<String>) -> Self {
        Self {
            id: ItemId(id),
            kind,
            name: name.into(),
            code: String::new(),
            supplier: None,
            quantity: None,
            unit_cost: None,
            dates: Vec::new(),
            flagged: false,
        }
    }

    /// Every field eligible for direct text matching, rendered as text.
    ///
    /// Numbers use `Display` (`2.5`, `3`); cost is also rendered with two
    /// decimals so `2.50` matches what the user sees.
    pub fn match_fields(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(6 + self.dates.len());
        out.push(self.name.clone());
        if !self.code.is_empty() {
            out.push(self.code.clone());
        }
        if let Some(supplier) = &self.supplier {
            out.push(supplier.clone());
        }
        if let Some(q) = self.quantity {
            out.push(q.to_string());
        }
        if let Some(cost) = self.unit_cost {
            out.push(cost.to_string());
            out.push(format!("{cost:.2}"));
        }
        for date in &self.dates {
            out.push(date.format("%Y-%m-%d").to_string());
        }
        out
    }
}

/// A container owning an ordered subset of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<ItemId>,
    /// Persisted, search-independent collapse state.
    #[serde(default)]
    pub collapsed: bool,
}

/// Point-in-time copy of everything the views render.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    pub items: Vec<Item>,
    pub groups: Vec<Group>,
}

impl Inventory {
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// Explicit container → children index, rebuilt whenever the inventory is reloaded.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    order: Vec<GroupId>,
    children: HashMap<GroupId, Vec<ItemId>>,
    owners: BTreeMap<ItemId, Vec<GroupId>>,
}

impl GroupIndex {
    pub fn build(inventory: &Inventory) -> Self {
        let mut index = Self::default();
        for group in &inventory.groups {
            index.order.push(group.id);
            let mut members = Vec::with_capacity(group.members.len());
            for member in &group.members {
                if members.contains(member) {
                    continue;
                }
                members.push(*member);
                index.owners.entry(*member).or_default().push(group.id);
            }
            index.children.insert(group.id, members);
        }
        index
    }

    /// Groups in display order.
    pub fn groups(&self) -> &[GroupId] {
        &self.order
    }

    pub fn children(&self, group: GroupId) -> &[ItemId] {
        self.children.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owners(&self, item: ItemId) -> &[GroupId] {
        self.owners.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_fields_render_numbers_and_dates_as_text() {
        let mut item = Item::new(7, ItemKind::Ingredient, "Cane Sugar");
        item.code = "978123456786".into();
        item.quantity = Some(3.0);
        item.unit_cost = Some(2.5);
        item.dates = vec![NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()];

        let fields = item.match_fields();
        assert!(fields.contains(&"3".to_string()));
        assert!(fields.contains(&"2.5".to_string()));
        assert!(fields.contains(&"2.50".to_string()));
        assert!(fields.contains(&"2025-03-09".to_string()));
        assert!(fields.contains(&"978123456786".to_string()));
    }

    #[test]
    fn group_index_dedups_members_and_tracks_owners() {
        let inventory = Inventory {
            items: vec![],
            groups: vec![
                Group {
                    id: GroupId(1),
                    name: "A".into(),
                    members: vec![ItemId(1), ItemId(2), ItemId(1)],
                    collapsed: false,
                },
                Group {
                    id: GroupId(2),
                    name: "B".into(),
                    members: vec![ItemId(2)],
                    collapsed: true,
                },
            ],
        };
        let index = GroupIndex::build(&inventory);
        assert_eq!(index.children(GroupId(1)), &[ItemId(1), ItemId(2)]);
        assert_eq!(index.owners(ItemId(2)), &[GroupId(1), GroupId(2)]);
        assert!(index.children(GroupId(9)).is_empty());
        assert_eq!(index.groups(), &[GroupId(1), GroupId(2)]);
    }
}
