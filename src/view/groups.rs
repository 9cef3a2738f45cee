//! Container planning and pre-search collapse snapshots.
//!
//! Containers carry a persisted `collapsed` flag that has nothing to do with
//! search. While a search is active, containers with matches are force-expanded
//! (never persisted); when the query clears, each container goes back to the
//! value captured when the search started.

use std::collections::HashMap;

use super::surface::Element;
use super::visibility::Planner;
use crate::model::types::{GroupId, GroupIndex, Inventory};
use crate::search::fanout::VisibilitySet;

/// Count label shown next to a container name.
pub fn count_label(count: usize) -> String {
    format!("({count})")
}

/// Pre-search collapse states, captured once per search session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseSnapshot {
    captured: Option<HashMap<GroupId, bool>>,
}

impl CollapseSnapshot {
    /// Capture persisted states on the transition into "search active".
    /// Returns `false` if a capture already exists.
    pub fn capture(&mut self, inventory: &Inventory) -> bool {
        if self.captured.is_some() {
            return false;
        }
        self.captured = Some(
            inventory
                .groups
                .iter()
                .map(|g| (g.id, g.collapsed))
                .collect(),
        );
        true
    }

    pub fn is_active(&self) -> bool {
        self.captured.is_some()
    }

    pub fn get(&self) -> Option<&HashMap<GroupId, bool>> {
        self.captured.as_ref()
    }

    /// Record a user toggle made while the search is active.
    pub fn update(&mut self, group: GroupId, collapsed: bool) {
        if let Some(captured) = self.captured.as_mut() {
            captured.insert(group, collapsed);
        }
    }

    /// Discard the capture once it has been restored.
    pub fn take(&mut self) -> Option<HashMap<GroupId, bool>> {
        self.captured.take()
    }
}

pub(crate) fn plan_groups_search(planner: &mut Planner<'_>, index: &GroupIndex, set: &VisibilitySet) {
    for &group in index.groups() {
        let header = Element::Group(group);
        planner.ensure(header);
        let children = index.children(group);
        let matched = children.iter().filter(|id| set.contains(**id)).count();
        if matched == 0 {
            planner.want(header, false);
            continue;
        }
        planner.want(header, true);
        if !planner.snapshot().is_expanded(group) {
            planner.plan.expand.push((group, true));
        }
        // Expanded containers can still miss children added since they
        // were built; ensure only creates what is absent.
        for &child in children {
            let element = Element::Child(group, child);
            planner.ensure(element);
            planner.want(element, set.contains(child));
        }
        planner.plan.labels.push((group, count_label(matched)));
    }
}

pub(crate) fn plan_groups_reveal(
    planner: &mut Planner<'_>,
    inventory: &Inventory,
    index: &GroupIndex,
    restore: Option<&HashMap<GroupId, bool>>,
) {
    for &group in index.groups() {
        let header = Element::Group(group);
        planner.ensure(header);
        planner.want(header, true);

        let persisted = inventory.group(group).is_some_and(|g| g.collapsed);
        let collapsed = restore
            .and_then(|r| r.get(&group).copied())
            .unwrap_or(persisted);
        let children = index.children(group);
        let expanded_now = planner.snapshot().is_expanded(group);
        if collapsed {
            if expanded_now || !planner.snapshot().expanded.contains_key(&group) {
                planner.plan.expand.push((group, false));
            }
            for &child in children {
                planner.remove(Element::Child(group, child));
            }
        } else {
            if !expanded_now {
                planner.plan.expand.push((group, true));
            }
            for &child in children {
                let element = Element::Child(group, child);
                planner.ensure(element);
                planner.want(element, true);
            }
        }
        planner.plan.labels.push((group, count_label(children.len())));
    }
}
