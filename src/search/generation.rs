//! Generation ledger: the single source of truth for which search attempt is current.
//!
//! Every asynchronous continuation carries the [`Generation`] it was started
//! under and must go through [`GenerationLedger::run_if_current`] before it
//! touches shared state. Nothing is ever aborted mid-flight; stale work simply
//! has its effects dropped.

use parking_lot::RwLock;
use std::fmt;

/// Monotonic token identifying one search attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct GenerationLedger {
    current: RwLock<u64>,
}

impl GenerationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new current generation, superseding every earlier one.
    ///
    /// Blocks while any `run_if_current` section is running, so a check and
    /// the write it guards are never split by a mint.
    pub fn begin(&self) -> Generation {
        let mut current = self.current.write();
        *current += 1;
        Generation(*current)
    }

    // Reads are recursive so a check nested inside `run_if_current` does not
    // queue behind a waiting `begin`.

    pub fn current(&self) -> Generation {
        Generation(*self.current.read_recursive())
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        *self.current.read_recursive() == generation.0
    }

    /// Run `f` only if `generation` is still current, holding the ledger
    /// for the duration of `f`.
    ///
    /// `f` may read the ledger but must never call [`Self::begin`]: the mint
    /// waits for this section to finish and deadlocks.
    pub fn run_if_current<R>(&self, generation: Generation, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.current.read_recursive();
        if *current != generation.0 {
            return None;
        }
        let out = f();
        drop(current);
        Some(out)
    }
}
