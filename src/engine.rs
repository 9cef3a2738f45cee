//! Search engine facade.
//!
//! Wires the pipeline together:
//!
//! ```text
//! keystroke → Debouncer → Generation minted → fan-out/fan-in (cache)
//!           → planners (flat, groups, detail) → TransitionScheduler → Surface
//! ```
//!
//! A data change re-enters at the fan-out stage through [`SearchEngine::rerun`]
//! using the last committed term, without a debounce delay.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::model::types::{GroupId, GroupIndex, Inventory, ItemId};
use crate::search::cache::{CacheStats, ResultCache};
use crate::search::catalog::Catalog;
use crate::search::debounce::Debouncer;
use crate::search::fanout::{QueryResolver, Resolution, VisibilitySet};
use crate::search::generation::{Generation, GenerationLedger};
use crate::view::groups::CollapseSnapshot;
use crate::view::surface::{Element, Surface};
use crate::view::transition::{TimerRegistry, TransitionOutcome, TransitionScheduler};
use crate::view::visibility::{ViewPlan, plan_reveal, plan_search};

#[derive(Default)]
struct EngineState {
    inventory: Arc<Inventory>,
    index: Arc<GroupIndex>,
    last_term: String,
    collapse: CollapseSnapshot,
    /// Matches of the last applied search; `None` while the query is empty.
    last_set: Option<VisibilitySet>,
}

struct Inner {
    ledger: Arc<GenerationLedger>,
    cache: Arc<Mutex<ResultCache>>,
    catalog: Arc<dyn Catalog>,
    surface: Arc<dyn Surface>,
    resolver: QueryResolver,
    transitions: TransitionScheduler,
    debouncer: Debouncer,
    state: Mutex<EngineState>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
        self.transitions.cancel_all();
    }
}

/// Cheaply cloneable handle to one engine instance.
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<Inner>,
}

impl SearchEngine {
    pub fn new(config: EngineConfig, catalog: Arc<dyn Catalog>, surface: Arc<dyn Surface>) -> Self {
        let ledger = Arc::new(GenerationLedger::new());
        let cache = Arc::new(Mutex::new(ResultCache::new(
            config.cache_capacity,
            config.cache_ttl,
        )));
        let resolver = QueryResolver::new(
            catalog.clone(),
            cache.clone(),
            ledger.clone(),
            config.source_timeout,
        );
        let transitions = TransitionScheduler::new(
            config.transitions,
            ledger.clone(),
            surface.clone(),
            Arc::new(TimerRegistry::new()),
        );
        Self {
            inner: Arc::new(Inner {
                ledger,
                cache,
                catalog,
                surface,
                resolver,
                transitions,
                debouncer: Debouncer::new(config.debounce),
                state: Mutex::new(EngineState::default()),
                inflight: Mutex::new(Vec::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Fetch the inventory, subscribe to data changes and render the current term.
    pub async fn load(&self) -> Result<()> {
        self.reload().await?;
        self.spawn_change_listener();
        self.rerun();
        Ok(())
    }

    /// Replace the inventory snapshot and its container index.
    pub async fn reload(&self) -> Result<()> {
        let inventory = self
            .inner
            .catalog
            .snapshot()
            .await
            .context("loading inventory snapshot")?;
        let index = GroupIndex::build(&inventory);
        info!(
            items = inventory.items.len(),
            groups = inventory.groups.len(),
            "inventory loaded"
        );
        let mut state = self.inner.state.lock();
        state.inventory = Arc::new(inventory);
        state.index = Arc::new(index);
        Ok(())
    }

    /// Keystroke entry point. Non-empty terms are debounced; an empty term
    /// clears immediately.
    pub fn search(&self, term: &str) {
        if term.trim().is_empty() {
            self.inner.debouncer.cancel();
            self.commit(String::new());
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let term = term.to_string();
        self.inner.debouncer.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                SearchEngine { inner }.commit(term);
            }
        });
    }

    /// Explicit submit: commit now, dropping any pending keystroke.
    pub fn submit(&self, term: &str) -> Generation {
        self.inner.debouncer.cancel();
        self.commit(term.to_string())
    }

    /// Re-resolve the last committed term without a debounce delay.
    pub fn rerun(&self) -> Generation {
        let term = self.inner.state.lock().last_term.clone();
        self.commit(term)
    }

    /// Clear the term and the cache, cancel outstanding transitions and
    /// restore every container.
    pub fn reset(&self) -> Generation {
        self.inner.debouncer.cancel();
        self.inner.cache.lock().clear();
        self.inner.transitions.cancel_all();
        self.commit(String::new())
    }

    fn commit(&self, term: String) -> Generation {
        let generation = self.inner.ledger.begin();
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.last_term = term.clone();
            if !term.trim().is_empty() && state.collapse.capture(&state.inventory) {
                debug!(%generation, "captured pre-search collapse states");
            }
        }
        debug!(%generation, query = %term, "search committed");

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.run(generation, term).await });
        let mut inflight = self.inner.inflight.lock();
        inflight.retain(|h| !h.is_finished());
        inflight.push(handle);
        generation
    }

    async fn run(self, generation: Generation, term: String) {
        let inventory = self.inner.state.lock().inventory.clone();
        let set = if term.trim().is_empty() {
            None
        } else {
            match self.inner.resolver.resolve(&term, generation, &inventory).await {
                Resolution::Current(set) => Some(set),
                Resolution::Stale => return,
            }
        };

        let inner = &self.inner;
        let applied = inner.ledger.run_if_current(generation, || {
            let mut state = inner.state.lock();
            let snapshot = inner.surface.snapshot();
            let plan = match &set {
                Some(set) => plan_search(&state.inventory, &state.index, set, &snapshot),
                None => {
                    let restore = state.collapse.take();
                    plan_reveal(&state.inventory, &state.index, restore.as_ref(), &snapshot)
                }
            };
            state.last_set = set;
            apply_structure(inner.surface.as_ref(), &plan);
            plan
        });
        let Some(plan) = applied else {
            debug!(%generation, "plan superseded before apply");
            return;
        };
        let ViewPlan {
            fade_out,
            fade_in,
            visible_items,
            ..
        } = plan;

        if inner.transitions.fade_out(fade_out, generation).await == TransitionOutcome::Superseded {
            return;
        }
        if inner.transitions.fade_in(fade_in, generation).await == TransitionOutcome::Superseded {
            return;
        }
        let settled = inner.ledger.run_if_current(generation, || {
            inner.surface.set_empty_state(visible_items == 0);
        });
        if settled.is_some() {
            info!(%generation, query = %term, visible = visible_items, "search settled");
        }
    }

    /// Select the item shown in the detail panel.
    pub fn select(&self, item: Option<ItemId>) {
        let surface = self.inner.surface.as_ref();
        surface.show_detail(item);
        let Some(id) = item else {
            surface.remove(Element::Detail);
            return;
        };
        let show = self
            .inner
            .state
            .lock()
            .last_set
            .as_ref()
            .is_none_or(|set| set.contains(id));
        surface.materialize(Element::Detail);
        surface.set_hidden(Element::Detail, !show);
        surface.set_faded(Element::Detail, !show);
    }

    /// Toggle a container by user action and persist the new collapse state.
    /// Returns whether the container is now expanded.
    pub async fn toggle_group(&self, group: GroupId) -> Result<bool> {
        let surface = self.inner.surface.as_ref();
        let expanded = !surface.snapshot().is_expanded(group);
        let collapsed = !expanded;
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if !state.index.groups().contains(&group) {
                return Err(anyhow!("unknown group {group}"));
            }
            if let Some(g) = Arc::make_mut(&mut state.inventory)
                .groups
                .iter_mut()
                .find(|g| g.id == group)
            {
                g.collapsed = collapsed;
            }
            state.collapse.update(group, collapsed);

            surface.set_expanded(group, expanded);
            for &child in state.index.children(group) {
                let element = Element::Child(group, child);
                if expanded {
                    let show = state.last_set.as_ref().is_none_or(|set| set.contains(child));
                    surface.materialize(element);
                    surface.set_hidden(element, !show);
                    surface.set_faded(element, !show);
                } else {
                    surface.remove(element);
                }
            }
        }
        self.inner
            .catalog
            .set_collapsed(group, collapsed)
            .await
            .with_context(|| format!("persisting collapse state of group {group}"))?;
        debug!(%group, expanded, "group toggled");
        Ok(expanded)
    }

    /// Wait until no debounce timer is pending and every committed pipeline
    /// has finished.
    pub async fn wait_idle(&self) {
        loop {
            self.inner.debouncer.flush().await;
            let pending = std::mem::take(&mut *self.inner.inflight.lock());
            if pending.is_empty() {
                if self.inner.debouncer.is_pending() {
                    continue;
                }
                break;
            }
            for handle in pending {
                if let Err(err) = handle.await
                    && err.is_panic()
                {
                    warn!(error = %err, "search pipeline panicked");
                }
            }
        }
    }

    /// React to a data-changed notification.
    pub async fn on_data_changed(&self) {
        self.inner.cache.lock().clear();
        if let Err(err) = self.reload().await {
            warn!(error = %err, "reload after data change failed");
        }
        self.rerun();
    }

    fn spawn_change_listener(&self) {
        let mut slot = self.inner.listener.lock();
        if slot.is_some() {
            return;
        }
        let Some(mut changes) = self.inner.catalog.subscribe() else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => debug!(?change, "data changed"),
                    Err(RecvError::Lagged(missed)) => debug!(missed, "data change notifications lagged"),
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SearchEngine { inner }.on_data_changed().await;
            }
        }));
    }

    /// Abort every outstanding animation timer.
    pub fn cancel_transitions(&self) -> usize {
        self.inner.transitions.cancel_all()
    }

    pub fn last_term(&self) -> String {
        self.inner.state.lock().last_term.clone()
    }

    pub fn current_generation(&self) -> Generation {
        self.inner.ledger.current()
    }

    /// True between the first non-empty commit and the restore that follows
    /// the query clearing.
    pub fn is_search_active(&self) -> bool {
        self.inner.state.lock().collapse.is_active()
    }

    pub fn last_visible(&self) -> Option<VisibilitySet> {
        self.inner.state.lock().last_set.clone()
    }

    pub fn inventory(&self) -> Arc<Inventory> {
        self.inner.state.lock().inventory.clone()
    }

    pub fn index(&self) -> Arc<GroupIndex> {
        self.inner.state.lock().index.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.lock().stats()
    }
}

fn apply_structure(surface: &dyn Surface, plan: &ViewPlan) {
    for element in &plan.remove {
        surface.remove(*element);
    }
    for element in &plan.materialize {
        surface.materialize(*element);
    }
    for (group, expanded) in &plan.expand {
        surface.set_expanded(*group, *expanded);
    }
    for (group, label) in &plan.labels {
        surface.set_label(*group, label.clone());
    }
}
