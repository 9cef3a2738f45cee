//! Staggered fade scheduling.
//!
//! Elements are animated in fixed-size batches; batch starts and items inside a
//! batch are offset by small delays so hundreds of rows never animate in the
//! same frame. Each item re-checks its generation before every visual change.
//! All item timers live in a [`TimerRegistry`] so they can be cancelled in bulk.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use super::surface::{Element, Surface};
use crate::config::TransitionConfig;
use crate::search::generation::{Generation, GenerationLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

/// Result of a whole fade call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Every element reached its target state under a still-current generation.
    Settled,
    /// At least one element was skipped or cancelled; dependents must not run.
    Superseded,
}

/// Process-wide registry of outstanding animation timers.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: AtomicU64,
    handles: Mutex<HashMap<u64, AbortHandle>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: AbortHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handles = self.handles.lock();
        handles.retain(|_, h| !h.is_finished());
        handles.insert(id, handle);
        id
    }

    pub fn release(&self, id: u64) {
        self.handles.lock().remove(&id);
    }

    /// Abort every outstanding timer; returns how many were still pending.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<AbortHandle> = self.handles.lock().drain().map(|(_, h)| h).collect();
        let mut pending = 0;
        for handle in drained {
            if !handle.is_finished() {
                pending += 1;
            }
            handle.abort();
        }
        pending
    }

    pub fn outstanding(&self) -> usize {
        self.handles
            .lock()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}

/// Start offset of each of `count` items.
pub fn stagger_offsets(count: usize, config: &TransitionConfig) -> Vec<Duration> {
    let batch_size = config.batch_size.max(1);
    (0..count)
        .map(|i| {
            let batch = (i / batch_size) as u32;
            let pos = (i % batch_size) as u32;
            config.batch_stagger * batch + config.item_stagger * pos
        })
        .collect()
}

enum ItemOutcome {
    Settled,
    Superseded,
}

pub struct TransitionScheduler {
    config: TransitionConfig,
    ledger: Arc<GenerationLedger>,
    surface: Arc<dyn Surface>,
    timers: Arc<TimerRegistry>,
}

impl TransitionScheduler {
    pub fn new(
        config: TransitionConfig,
        ledger: Arc<GenerationLedger>,
        surface: Arc<dyn Surface>,
        timers: Arc<TimerRegistry>,
    ) -> Self {
        Self {
            config,
            ledger,
            surface,
            timers,
        }
    }

    pub fn timers(&self) -> &Arc<TimerRegistry> {
        &self.timers
    }

    pub fn cancel_all(&self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "cancelled outstanding transitions");
        }
        cancelled
    }

    /// Fade elements out, then drop them from layout.
    pub async fn fade_out(&self, elements: Vec<Element>, generation: Generation) -> TransitionOutcome {
        self.run(FadeKind::Out, elements, generation).await
    }

    /// Put elements back into layout, then fade them in.
    pub async fn fade_in(&self, elements: Vec<Element>, generation: Generation) -> TransitionOutcome {
        self.run(FadeKind::In, elements, generation).await
    }

    async fn run(&self, kind: FadeKind, elements: Vec<Element>, generation: Generation) -> TransitionOutcome {
        if elements.is_empty() {
            return self.settled_if_current(generation);
        }
        let origin = Instant::now();
        let offsets = stagger_offsets(elements.len(), &self.config);
        let count = elements.len();
        let mut tasks = Vec::with_capacity(count);
        for (element, offset) in elements.into_iter().zip(offsets) {
            let ledger = self.ledger.clone();
            let surface = self.surface.clone();
            let fade = self.config.fade;
            let fire_at = origin + offset;
            let task = tokio::spawn(async move {
                animate(kind, element, fire_at, fade, generation, &ledger, surface.as_ref()).await
            });
            let id = self.timers.register(task.abort_handle());
            tasks.push((id, task));
        }

        let mut outcome = TransitionOutcome::Settled;
        for (id, task) in tasks {
            match task.await {
                Ok(ItemOutcome::Settled) => {}
                Ok(ItemOutcome::Superseded) | Err(_) => outcome = TransitionOutcome::Superseded,
            }
            self.timers.release(id);
        }
        debug!(%generation, ?kind, count, ?outcome, "transition batch finished");
        match outcome {
            TransitionOutcome::Settled => self.settled_if_current(generation),
            TransitionOutcome::Superseded => outcome,
        }
    }

    fn settled_if_current(&self, generation: Generation) -> TransitionOutcome {
        if self.ledger.is_current(generation) {
            TransitionOutcome::Settled
        } else {
            TransitionOutcome::Superseded
        }
    }
}

async fn animate(
    kind: FadeKind,
    element: Element,
    fire_at: Instant,
    fade: Duration,
    generation: Generation,
    ledger: &GenerationLedger,
    surface: &dyn Surface,
) -> ItemOutcome {
    tokio::time::sleep_until(fire_at).await;
    match kind {
        FadeKind::Out => {
            if ledger.run_if_current(generation, || surface.set_faded(element, true)).is_none() {
                return ItemOutcome::Superseded;
            }
            tokio::time::sleep(fade).await;
            if ledger.run_if_current(generation, || surface.set_hidden(element, true)).is_none() {
                return ItemOutcome::Superseded;
            }
        }
        FadeKind::In => {
            let unhidden = ledger.run_if_current(generation, || {
                surface.set_hidden(element, false);
                surface.reflow(element);
            });
            if unhidden.is_none() {
                return ItemOutcome::Superseded;
            }
            // Let the unhidden frame land before the opacity change.
            tokio::task::yield_now().await;
            if ledger.run_if_current(generation, || surface.set_faded(element, false)).is_none() {
                return ItemOutcome::Superseded;
            }
            tokio::time::sleep(fade).await;
            if !ledger.is_current(generation) {
                return ItemOutcome::Superseded;
            }
        }
    }
    ItemOutcome::Settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ItemId;
    use crate::view::surface::{ElementState, SurfaceOp, ViewModel};

    fn setup() -> (Arc<GenerationLedger>, Arc<ViewModel>, TransitionScheduler) {
        let ledger = Arc::new(GenerationLedger::new());
        let view = Arc::new(ViewModel::recording());
        let scheduler = TransitionScheduler::new(
            TransitionConfig::default(),
            ledger.clone(),
            view.clone(),
            Arc::new(TimerRegistry::new()),
        );
        (ledger, view, scheduler)
    }

    fn rows(n: i64) -> Vec<Element> {
        (1..=n).map(|i| Element::Row(ItemId(i))).collect()
    }

    #[test]
    fn offsets_stagger_batches_and_items() {
        let cfg = TransitionConfig {
            batch_size: 3,
            batch_stagger: Duration::from_millis(10),
            item_stagger: Duration::from_millis(5),
            fade: Duration::from_millis(200),
        };
        let offsets: Vec<u64> = stagger_offsets(7, &cfg)
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(offsets, vec![0, 5, 10, 10, 15, 20, 20]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn fade_out_settles_and_hides() {
        let (ledger, view, scheduler) = setup();
        for el in rows(20) {
            view.materialize(el);
            view.set_hidden(el, false);
            view.set_faded(el, false);
        }
        let generation = ledger.begin();
        let outcome = scheduler.fade_out(rows(20), generation).await;
        assert_eq!(outcome, TransitionOutcome::Settled);
        for el in rows(20) {
            assert_eq!(
                view.state_of(el),
                Some(ElementState {
                    hidden: true,
                    faded: true
                })
            );
        }
        assert_eq!(scheduler.timers().outstanding(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn fade_in_unhides_before_unfading() {
        let (ledger, view, scheduler) = setup();
        let el = Element::Row(ItemId(1));
        view.materialize(el);
        view.clear_ops();
        let generation = ledger.begin();
        assert_eq!(scheduler.fade_in(vec![el], generation).await, TransitionOutcome::Settled);
        assert_eq!(
            view.ops(),
            vec![
                SurfaceOp::Hide {
                    element: el,
                    hidden: false
                },
                SurfaceOp::Reflow(el),
                SurfaceOp::Fade {
                    element: el,
                    faded: false
                },
            ]
        );
        assert!(view.is_visible(el));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn superseded_generation_applies_nothing() {
        let (ledger, view, scheduler) = setup();
        for el in rows(3) {
            view.materialize(el);
        }
        view.clear_ops();
        let stale = ledger.begin();
        ledger.begin();
        let outcome = scheduler.fade_in(rows(3), stale).await;
        assert_eq!(outcome, TransitionOutcome::Superseded);
        assert!(view.ops().is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancel_all_aborts_pending_timers() {
        let (ledger, view, scheduler) = setup();
        let scheduler = Arc::new(scheduler);
        for el in rows(40) {
            view.materialize(el);
        }
        view.clear_ops();
        let generation = ledger.begin();
        let run = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.fade_in(rows(40), generation).await })
        };
        tokio::task::yield_now().await;
        assert!(scheduler.timers().outstanding() > 0);
        scheduler.cancel_all();
        assert_eq!(run.await.unwrap(), TransitionOutcome::Superseded);
        let faded_in = view
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Fade { faded: false, .. }))
            .count();
        assert!(faded_in < 40);
    }
}
