//! Engine tuning knobs, loaded from the environment.

use std::time::Duration;

/// Timing and sizing for the search pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period before a keystroke is committed.
    pub debounce: Duration,
    /// Lifetime of a cached sub-query result.
    pub cache_ttl: Duration,
    /// Maximum cached (query, source) pairs.
    pub cache_capacity: usize,
    /// Collaborator calls slower than this count as failed.
    pub source_timeout: Duration,
    pub transitions: TransitionConfig,
}

/// Staggered fade scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionConfig {
    pub batch_size: usize,
    /// Delay between consecutive batch starts.
    pub batch_stagger: Duration,
    /// Delay between items inside one batch.
    pub item_stagger: Duration,
    /// Length of one fade.
    pub fade: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            batch_stagger: Duration::from_millis(8),
            item_stagger: Duration::from_millis(5),
            fade: Duration::from_millis(200),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            cache_ttl: Duration::from_secs(30),
            cache_capacity: 256,
            source_timeout: Duration::from_millis(2000),
            transitions: TransitionConfig::default(),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    dotenvy::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl EngineConfig {
    /// Load config from environment variables, keeping defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(ms) = env_u64("INVSEARCH_DEBOUNCE_MS") {
            cfg.debounce = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("INVSEARCH_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("INVSEARCH_CACHE_CAPACITY")
            && n > 0
        {
            cfg.cache_capacity = n as usize;
        }
        if let Some(ms) = env_u64("INVSEARCH_SOURCE_TIMEOUT_MS") {
            cfg.source_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("INVSEARCH_BATCH_SIZE") {
            cfg.transitions.batch_size = (n as usize).max(1);
        }
        if let Some(ms) = env_u64("INVSEARCH_BATCH_STAGGER_MS") {
            cfg.transitions.batch_stagger = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("INVSEARCH_ITEM_STAGGER_MS") {
            cfg.transitions.item_stagger = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("INVSEARCH_FADE_MS") {
            cfg.transitions.fade = Duration::from_millis(ms);
        }

        cfg
    }

    /// Zero-delay timings, handy for headless runs.
    pub fn instant() -> Self {
        Self {
            debounce: Duration::ZERO,
            transitions: TransitionConfig {
                batch_stagger: Duration::ZERO,
                item_stagger: Duration::ZERO,
                fade: Duration::ZERO,
                ..TransitionConfig::default()
            },
            ..Self::default()
        }
    }
}
