//! What a [`ViewFrame`] currently shows, resolved against the inventory.
//!
//! Elements that are materialized and not hidden are listed; faded ones are
//! still listed (they are mid-transition) and flagged so renderers can dim
//! them.

use serde::Serialize;

use crate::model::types::{Group, GroupId, Inventory, Item, ItemId};
use crate::view::surface::{Element, ViewFrame};

#[derive(Debug, Clone, Copy)]
pub struct RowLine<'a> {
    pub item: &'a Item,
    pub faded: bool,
}

#[derive(Debug, Clone)]
pub struct GroupLine<'a> {
    pub group: &'a Group,
    pub label: String,
    pub expanded: bool,
    pub faded: bool,
    pub children: Vec<RowLine<'a>>,
}

fn listed(frame: &ViewFrame, element: Element) -> Option<bool> {
    frame
        .state(&element)
        .filter(|state| !state.hidden)
        .map(|state| state.faded)
}

/// Flat list rows in inventory order.
pub fn visible_rows<'a>(frame: &ViewFrame, inventory: &'a Inventory) -> Vec<RowLine<'a>> {
    inventory
        .items
        .iter()
        .filter_map(|item| {
            listed(frame, Element::Row(item.id)).map(|faded| RowLine { item, faded })
        })
        .collect()
}

/// Container headers with their listed children (only while expanded).
pub fn visible_groups<'a>(frame: &ViewFrame, inventory: &'a Inventory) -> Vec<GroupLine<'a>> {
    inventory
        .groups
        .iter()
        .filter_map(|group| {
            let faded = listed(frame, Element::Group(group.id))?;
            let expanded = frame.expanded.get(&group.id).copied().unwrap_or(false);
            let children = if expanded {
                group
                    .members
                    .iter()
                    .filter_map(|&id| {
                        let item = inventory.item(id)?;
                        listed(frame, Element::Child(group.id, id))
                            .map(|faded| RowLine { item, faded })
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Some(GroupLine {
                group,
                label: frame.labels.get(&group.id).cloned().unwrap_or_default(),
                expanded,
                faded,
                children,
            })
        })
        .collect()
}

/// The item in the detail panel, if the panel is listed.
pub fn detail_item<'a>(frame: &ViewFrame, inventory: &'a Inventory) -> Option<RowLine<'a>> {
    let id = frame.detail?;
    let faded = listed(frame, Element::Detail)?;
    inventory.item(id).map(|item| RowLine { item, faded })
}

/// Serializable summary of a settled frame, printed by `invsearch query`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub query: String,
    pub items: Vec<Item>,
    pub groups: Vec<GroupReport>,
    pub empty: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub id: GroupId,
    pub name: String,
    pub label: String,
    pub expanded: bool,
    pub children: Vec<ItemId>,
}

impl FrameReport {
    pub fn build(query: &str, frame: &ViewFrame, inventory: &Inventory) -> Self {
        Self {
            query: query.to_string(),
            items: visible_rows(frame, inventory)
                .into_iter()
                .map(|row| row.item.clone())
                .collect(),
            groups: visible_groups(frame, inventory)
                .into_iter()
                .map(|line| GroupReport {
                    id: line.group.id,
                    name: line.group.name.clone(),
                    label: line.label,
                    expanded: line.expanded,
                    children: line.children.iter().map(|row| row.item.id).collect(),
                })
                .collect(),
            empty: frame.empty_state,
        }
    }

    /// Plain-text rendering: one item per line, then the group tree.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.empty {
            out.push_str(&format!("No items match \"{}\"\n", self.query));
        }
        for item in &self.items {
            out.push_str(&format!("{}\t{}\t{}\n", item.kind.as_str(), item.code, item.name));
        }
        if !self.groups.is_empty() {
            out.push('\n');
        }
        for group in &self.groups {
            let marker = if group.expanded { '▾' } else { '▸' };
            out.push_str(&format!("{marker} {} {}\n", group.name, group.label));
            for child in &group.children {
                if let Some(item) = self.items.iter().find(|item| item.id == *child) {
                    out.push_str(&format!("    {}\n", item.name));
                } else {
                    out.push_str(&format!("    #{child}\n"));
                }
            }
        }
        out
    }
}
