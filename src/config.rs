//! Cache configuration (spec.md §6, ambient stack §1.3 of `SPEC_FULL.md`).
//!
//! [`CacheBuilder`] is the single entry point for constructing a
//! [`crate::engine::Cache`] — mirrors the teacher's "config struct is the
//! only way to construct a cache" philosophy (`config/mod.rs`'s module doc
//! comment), generalized to one builder covering every policy instead of
//! one config type per algorithm.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::error::ConfigError;
use crate::policy::PolicyKind;
use crate::stats::Listener;

/// Whether an LRU/LFU policy consults the frequency sketch when choosing a
/// victim (spec.md §6 "sketch_kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SketchKind {
    /// No sketch; victim selection is purely structural (tail of the list).
    #[default]
    None,
    /// Sketch-backed tie-breaking sized to the configured capacity.
    Basic,
    /// Reserved for a wider/deeper sketch tuning; currently identical to
    /// [`SketchKind::Basic`] — this crate ships one sketch width policy.
    Optimized,
}

type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// Fluent builder for a [`crate::engine::Cache`] (spec.md §6).
pub struct CacheBuilder<K, V> {
    maximum_size: Option<u64>,
    maximum_weight: Option<u64>,
    weigher: Option<Weigher<K, V>>,
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    refresh_after_write: Option<Duration>,
    eviction_policy: PolicyKind,
    sketch_kind: SketchKind,
    record_stats: bool,
    listeners: Vec<Arc<dyn Listener<K, V>>>,
    initial_capacity: Option<usize>,
    shard_count: Option<usize>,
    clock: Option<Arc<dyn Clock>>,
    name: Option<String>,
    idle_threshold: Option<Duration>,
    window_protected_ratio: f64,
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self {
            maximum_size: None,
            maximum_weight: None,
            weigher: None,
            expire_after_write: None,
            expire_after_access: None,
            refresh_after_write: None,
            eviction_policy: PolicyKind::WindowTinyLfu,
            sketch_kind: SketchKind::None,
            record_stats: true,
            listeners: Vec::new(),
            initial_capacity: None,
            shard_count: None,
            clock: None,
            name: None,
            idle_threshold: None,
            window_protected_ratio: 0.8,
        }
    }
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("eviction_policy", &self.eviction_policy)
            .field("sketch_kind", &self.sketch_kind)
            .field("record_stats", &self.record_stats)
            .field("listeners", &self.listeners.len())
            .field("initial_capacity", &self.initial_capacity)
            .field("name", &self.name)
            .finish()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of live entries. Mutually exclusive with
    /// [`Self::maximum_weight`].
    #[must_use]
    pub fn maximum_size(mut self, max: u64) -> Self {
        self.maximum_size = Some(max);
        self
    }

    /// Maximum sum of entry weights. Requires [`Self::weigher`].
    #[must_use]
    pub fn maximum_weight(mut self, max: u64) -> Self {
        self.maximum_weight = Some(max);
        self
    }

    /// A function computing each entry's weight at insertion time. Default
    /// is a constant weight of 1.
    #[must_use]
    pub fn weigher(mut self, weigher: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    #[must_use]
    pub fn expire_after_write(mut self, duration: Duration) -> Self {
        self.expire_after_write = Some(duration);
        self
    }

    #[must_use]
    pub fn expire_after_access(mut self, duration: Duration) -> Self {
        self.expire_after_access = Some(duration);
        self
    }

    #[must_use]
    pub fn refresh_after_write(mut self, duration: Duration) -> Self {
        self.refresh_after_write = Some(duration);
        self
    }

    #[must_use]
    pub fn eviction_policy(mut self, policy: PolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }

    #[must_use]
    pub fn sketch_kind(mut self, kind: SketchKind) -> Self {
        self.sketch_kind = kind;
        self
    }

    #[must_use]
    pub fn record_stats(mut self, enabled: bool) -> Self {
        self.record_stats = enabled;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn Listener<K, V>>) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn initial_capacity(mut self, hint: usize) -> Self {
        self.initial_capacity = Some(hint);
        self
    }

    /// Number of independent lock-striped shards the entry index uses
    /// (spec.md §5 "fine-grained per-bucket synchronization"). Defaults to
    /// available parallelism, the way the teacher's
    /// `ConcurrentLruCacheConfig::new` does.
    #[must_use]
    pub fn shard_count(mut self, count: usize) -> Self {
        self.shard_count = Some(count);
        self
    }

    /// Overrides the monotonic clock source (default: [`MonotonicClock`]).
    /// Tests substitute a [`crate::clock::ManualClock`] here.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Registers this cache under `name` in the process-global stats
    /// registry (spec.md §5 "Shared resources": "a registry keyed by cache
    /// name"). Once built, `corecache::stats::named(name)` returns this
    /// cache's live [`crate::stats::Snapshot`] for as long as the cache
    /// itself stays alive.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Idle threshold for [`PolicyKind::Composite`] and
    /// [`PolicyKind::IdleTime`]; required when either is selected.
    #[must_use]
    pub fn idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = Some(threshold);
        self
    }

    /// Fraction of Window-TinyLFU's main space reserved for the protected
    /// segment (spec.md §4.2.6 "~80% of main"). Must lie strictly between
    /// 0.0 and 1.0. Default 0.8.
    #[must_use]
    pub fn window_tinylfu_protected_ratio(mut self, ratio: f64) -> Self {
        self.window_protected_ratio = ratio;
        self
    }

    fn default_segment_count() -> usize {
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(8)
            .clamp(1, 64)
    }

    /// Validates the configuration and constructs the cache (spec.md §7
    /// "Capacity: maximum-size/weight must be positive at construction —
    /// fails construction with a configuration error").
    pub fn build(self) -> Result<crate::engine::Cache<K, V>, ConfigError> {
        let capacity = match (self.maximum_size, self.maximum_weight) {
            (None, None) => return Err(ConfigError::NoCapacityConfigured),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingLimits),
            (Some(0), None) => return Err(ConfigError::NonPositiveCapacity),
            (None, Some(0)) => return Err(ConfigError::NonPositiveCapacity),
            (Some(n), None) => crate::lifecycle::CapacityLimit::Count(n),
            (None, Some(w)) => {
                if self.weigher.is_none() {
                    return Err(ConfigError::MissingWeigher);
                }
                crate::lifecycle::CapacityLimit::Weight(w)
            }
        };

        if matches!(self.eviction_policy, PolicyKind::WindowTinyLfu)
            && !(self.window_protected_ratio > 0.0 && self.window_protected_ratio < 1.0)
        {
            return Err(ConfigError::InvalidProtectedRatio);
        }

        let needs_idle_threshold = matches!(
            self.eviction_policy,
            PolicyKind::Composite | PolicyKind::IdleTime
        );
        let idle_threshold = if needs_idle_threshold {
            self.idle_threshold.unwrap_or(Duration::from_secs(300))
        } else {
            Duration::ZERO
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let weigher: Weigher<K, V> = self.weigher.unwrap_or_else(|| Arc::new(|_, _| 1));

        crate::engine::Cache::from_builder_parts(crate::engine::BuiltConfig {
            capacity,
            weigher,
            expire_after_write: self.expire_after_write,
            expire_after_access: self.expire_after_access,
            refresh_after_write: self.refresh_after_write,
            eviction_policy: self.eviction_policy,
            sketch_kind: self.sketch_kind,
            record_stats: self.record_stats,
            listeners: self.listeners,
            initial_capacity: self.initial_capacity,
            shard_count: self.shard_count.unwrap_or_else(Self::default_segment_count),
            clock,
            name: self.name,
            idle_threshold,
            window_protected_ratio: self.window_protected_ratio,
        })
    }
}
