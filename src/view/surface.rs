//! Rendering surface adapter.
//!
//! Planners compute decisions from data; only the [`Surface`] mutates what is
//! on screen. [`ViewModel`] is the in-memory implementation backing the
//! terminal UI and the tests.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::model::types::{GroupId, ItemId};

/// Address of one rendered element across all three views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    /// Row in the flat item list.
    Row(ItemId),
    /// Container header in the group view.
    Group(GroupId),
    /// Child row under a container.
    Child(GroupId, ItemId),
    /// The detail side panel.
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementState {
    /// Removed from layout (`display: none`).
    pub hidden: bool,
    /// Transparent (opacity 0).
    pub faded: bool,
}

impl ElementState {
    /// State of a freshly materialized element: present but invisible.
    pub const FRESH: Self = Self {
        hidden: true,
        faded: true,
    };
    pub const SHOWN: Self = Self {
        hidden: false,
        faded: false,
    };

    pub fn is_shown(self) -> bool {
        !self.hidden && !self.faded
    }
}

/// Read-only copy of the surface, input to the pure planners.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    pub elements: HashMap<Element, ElementState>,
    pub expanded: HashMap<GroupId, bool>,
    pub detail: Option<ItemId>,
}

impl SurfaceSnapshot {
    pub fn state(&self, element: &Element) -> Option<ElementState> {
        self.elements.get(element).copied()
    }

    pub fn is_expanded(&self, group: GroupId) -> bool {
        self.expanded.get(&group).copied().unwrap_or(false)
    }
}

/// Mutation log entry, recorded when the view model is built with
/// [`ViewModel::recording`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Materialize(Element),
    Remove(Element),
    Fade { element: Element, faded: bool },
    Hide { element: Element, hidden: bool },
    Reflow(Element),
    Expand { group: GroupId, expanded: bool },
    Label { group: GroupId, label: String },
    EmptyState(bool),
    Detail(Option<ItemId>),
}

pub trait Surface: Send + Sync {
    fn snapshot(&self) -> SurfaceSnapshot;
    /// Create `element` in the [`ElementState::FRESH`] state; no-op if present.
    fn materialize(&self, element: Element);
    fn remove(&self, element: Element);
    fn set_faded(&self, element: Element, faded: bool);
    fn set_hidden(&self, element: Element, hidden: bool);
    /// Force layout of `element` before it animates.
    fn reflow(&self, element: Element);
    fn set_expanded(&self, group: GroupId, expanded: bool);
    fn set_label(&self, group: GroupId, label: String);
    fn set_empty_state(&self, empty: bool);
    fn show_detail(&self, item: Option<ItemId>);
}

/// Everything the terminal UI needs to draw one frame.
#[derive(Debug, Clone, Default)]
pub struct ViewFrame {
    pub elements: HashMap<Element, ElementState>,
    pub expanded: HashMap<GroupId, bool>,
    pub labels: HashMap<GroupId, String>,
    pub empty_state: bool,
    pub detail: Option<ItemId>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl ViewFrame {
    pub fn state(&self, element: &Element) -> Option<ElementState> {
        self.elements.get(element).copied()
    }
}

#[derive(Debug, Default)]
struct ViewState {
    frame: ViewFrame,
    ops: Vec<SurfaceOp>,
}

#[derive(Debug, Default)]
pub struct ViewModel {
    state: Mutex<ViewState>,
    record: bool,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view model that keeps a log of every mutation.
    pub fn recording() -> Self {
        Self {
            state: Mutex::new(ViewState::default()),
            record: true,
        }
    }

    pub fn frame(&self) -> ViewFrame {
        self.state.lock().frame.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.lock().frame.version
    }

    pub fn state_of(&self, element: Element) -> Option<ElementState> {
        self.state.lock().frame.state(&element)
    }

    pub fn is_visible(&self, element: Element) -> bool {
        self.state_of(element).is_some_and(ElementState::is_shown)
    }

    pub fn label(&self, group: GroupId) -> Option<String> {
        self.state.lock().frame.labels.get(&group).cloned()
    }

    pub fn is_expanded(&self, group: GroupId) -> bool {
        self.state
            .lock()
            .frame
            .expanded
            .get(&group)
            .copied()
            .unwrap_or(false)
    }

    pub fn empty_state(&self) -> bool {
        self.state.lock().frame.empty_state
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.state.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    fn mutate(&self, op: SurfaceOp, f: impl FnOnce(&mut ViewFrame)) {
        let mut state = self.state.lock();
        f(&mut state.frame);
        state.frame.version += 1;
        if self.record {
            state.ops.push(op);
        }
    }
}

impl Surface for ViewModel {
    fn snapshot(&self) -> SurfaceSnapshot {
        let state = self.state.lock();
        SurfaceSnapshot {
            elements: state.frame.elements.clone(),
            expanded: state.frame.expanded.clone(),
            detail: state.frame.detail,
        }
    }

    fn materialize(&self, element: Element) {
        if self.state.lock().frame.elements.contains_key(&element) {
            return;
        }
        self.mutate(SurfaceOp::Materialize(element), |frame| {
            frame.elements.insert(element, ElementState::FRESH);
        });
    }

    fn remove(&self, element: Element) {
        self.mutate(SurfaceOp::Remove(element), |frame| {
            frame.elements.remove(&element);
        });
    }

    fn set_faded(&self, element: Element, faded: bool) {
        self.mutate(SurfaceOp::Fade { element, faded }, |frame| {
            if let Some(state) = frame.elements.get_mut(&element) {
                state.faded = faded;
            }
        });
    }

    fn set_hidden(&self, element: Element, hidden: bool) {
        self.mutate(SurfaceOp::Hide { element, hidden }, |frame| {
            if let Some(state) = frame.elements.get_mut(&element) {
                state.hidden = hidden;
            }
        });
    }

    fn reflow(&self, element: Element) {
        self.mutate(SurfaceOp::Reflow(element), |_| {});
    }

    fn set_expanded(&self, group: GroupId, expanded: bool) {
        self.mutate(SurfaceOp::Expand { group, expanded }, |frame| {
            frame.expanded.insert(group, expanded);
        });
    }

    fn set_label(&self, group: GroupId, label: String) {
        let op = SurfaceOp::Label {
            group,
            label: label.clone(),
        };
        self.mutate(op, |frame| {
            frame.labels.insert(group, label);
        });
    }

    fn set_empty_state(&self, empty: bool) {
        self.mutate(SurfaceOp::EmptyState(empty), |frame| {
            frame.empty_state = empty;
        });
    }

    fn show_detail(&self, item: Option<ItemId>) {
        self.mutate(SurfaceOp::Detail(item), |frame| {
            frame.detail = item;
        });
    }
}
