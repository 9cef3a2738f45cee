//! Pure show/hide planning for the flat list and the detail panel.
//!
//! Planners read a [`SurfaceSnapshot`] and produce a [`ViewPlan`]; they never
//! touch the surface themselves.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::groups::{plan_groups_reveal, plan_groups_search};
use super::surface::{Element, ElementState, SurfaceSnapshot};
use crate::model::types::{GroupId, GroupIndex, Inventory};
use crate::search::fanout::VisibilitySet;

/// Decisions for one generation, applied by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewPlan {
    /// Elements to create (hidden) before anything animates.
    pub materialize: Vec<Element>,
    pub remove: Vec<Element>,
    /// Expansion changes; never persisted.
    pub expand: Vec<(GroupId, bool)>,
    pub labels: Vec<(GroupId, String)>,
    pub fade_out: Vec<Element>,
    pub fade_in: Vec<Element>,
    /// Flat-list items visible once the plan settles.
    pub visible_items: usize,
}

impl ViewPlan {
    pub fn is_noop(&self) -> bool {
        self.materialize.is_empty()
            && self.remove.is_empty()
            && self.expand.is_empty()
            && self.fade_out.is_empty()
            && self.fade_in.is_empty()
    }
}

/// Planner working state: the snapshot plus what this plan already decided.
pub(crate) struct Planner<'a> {
    snapshot: &'a SurfaceSnapshot,
    created: HashSet<Element>,
    removed: HashSet<Element>,
    pub(crate) plan: ViewPlan,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(snapshot: &'a SurfaceSnapshot) -> Self {
        Self {
            snapshot,
            created: HashSet::new(),
            removed: HashSet::new(),
            plan: ViewPlan::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> &SurfaceSnapshot {
        self.snapshot
    }

    /// State `element` will have once materialization has run.
    fn planned_state(&self, element: &Element) -> Option<ElementState> {
        if self.removed.contains(element) {
            return None;
        }
        if self.created.contains(element) {
            return Some(ElementState::FRESH);
        }
        self.snapshot.state(element)
    }

    pub(crate) fn ensure(&mut self, element: Element) {
        if self.planned_state(&element).is_none() && self.created.insert(element) {
            self.removed.remove(&element);
            self.plan.materialize.push(element);
        }
    }

    pub(crate) fn remove(&mut self, element: Element) {
        if self.planned_state(&element).is_some() && self.removed.insert(element) {
            self.created.remove(&element);
            self.plan.remove.push(element);
        }
    }

    /// Schedule `element` towards shown or hidden. Elements already settled in
    /// the requested state are left alone so they do not re-animate.
    pub(crate) fn want(&mut self, element: Element, show: bool) {
        let Some(state) = self.planned_state(&element) else {
            return;
        };
        if show {
            if !state.is_shown() {
                self.plan.fade_in.push(element);
            }
        } else if !state.hidden {
            self.plan.fade_out.push(element);
        }
    }

    pub(crate) fn finish(self) -> ViewPlan {
        self.plan
    }
}

/// Drop elements whose items or groups no longer exist.
fn prune_structure(planner: &mut Planner<'_>, inventory: &Inventory, index: &GroupIndex) {
    let items: HashSet<_> = inventory.items.iter().map(|i| i.id).collect();
    let groups: HashSet<_> = index.groups().iter().copied().collect();
    let mut stale: Vec<Element> = planner
        .snapshot()
        .elements
        .keys()
        .filter(|el| match el {
            Element::Row(id) => !items.contains(id),
            Element::Group(g) => !groups.contains(g),
            Element::Child(g, id) => !groups.contains(g) || !index.children(*g).contains(id),
            Element::Detail => false,
        })
        .copied()
        .collect();
    stale.sort();
    for element in stale {
        planner.remove(element);
    }
}

/// Rows: rebuild if any expected row is missing, otherwise incremental.
fn plan_rows(planner: &mut Planner<'_>, inventory: &Inventory, show: impl Fn(&Element) -> bool) {
    let missing = inventory
        .items
        .iter()
        .filter(|item| planner.snapshot().state(&Element::Row(item.id)).is_none())
        .count();
    if missing > 0 {
        debug!(missing, total = inventory.items.len(), "rebuilding flat list");
        for item in &inventory.items {
            planner.ensure(Element::Row(item.id));
        }
    }
    for item in &inventory.items {
        let row = Element::Row(item.id);
        planner.want(row, show(&row));
    }
}

fn plan_detail(planner: &mut Planner<'_>, inventory: &Inventory, show: impl Fn(&Element) -> bool) {
    let Some(item) = planner.snapshot().detail else {
        return;
    };
    if inventory.item(item).is_none() {
        planner.want(Element::Detail, false);
        return;
    }
    planner.ensure(Element::Detail);
    planner.want(Element::Detail, show(&Element::Row(item)));
}

/// Plan a non-empty search across all three views.
pub fn plan_search(
    inventory: &Inventory,
    index: &GroupIndex,
    set: &VisibilitySet,
    snapshot: &SurfaceSnapshot,
) -> ViewPlan {
    let mut planner = Planner::new(snapshot);
    prune_structure(&mut planner, inventory, index);
    let shows = |el: &Element| matches!(el, Element::Row(id) if set.contains(*id));
    plan_rows(&mut planner, inventory, shows);
    plan_detail(&mut planner, inventory, shows);
    plan_groups_search(&mut planner, index, set);
    planner.plan.visible_items = inventory.items.iter().filter(|i| set.contains(i.id)).count();
    planner.finish()
}

/// Plan the empty-query path: reveal everything and restore containers to
/// `restore` (or their persisted state when no search was active).
pub fn plan_reveal(
    inventory: &Inventory,
    index: &GroupIndex,
    restore: Option<&HashMap<GroupId, bool>>,
    snapshot: &SurfaceSnapshot,
) -> ViewPlan {
    let mut planner = Planner::new(snapshot);
    prune_structure(&mut planner, inventory, index);
    plan_rows(&mut planner, inventory, |_| true);
    plan_detail(&mut planner, inventory, |_| true);
    plan_groups_reveal(&mut planner, inventory, index, restore);
    planner.plan.visible_items = inventory.items.len();
    planner.finish()
}
