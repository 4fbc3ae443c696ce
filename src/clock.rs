//! Monotonic clock abstraction.
//!
//! Every timestamp the core records (`created_at`, `last_access_at`, expiry
//! checks) is measured against a monotonic clock, never wall-clock time, so
//! that NTP adjustments or `SystemTime` skew cannot make an entry appear to
//! age backwards. See spec.md §4.4 ("Timestamps: use a monotonic clock").

use std::time::{Duration, Instant};

/// A source of monotonically increasing timestamps, expressed in nanoseconds
/// since an arbitrary, implementation-defined epoch.
///
/// This is the "required external collaborator" named in spec.md §6. The
/// default implementation wraps `std::time::Instant`; tests substitute
/// [`ManualClock`] to advance time deterministically without sleeping.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current time in nanoseconds since the clock's epoch.
    fn now_nanos(&self) -> u64;
}

/// The default clock, backed by `std::time::Instant`.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// A clock that only advances when told to, for deterministic expiration
/// and refresh-after-write tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `dur`.
    pub fn advance(&self, dur: Duration) {
        self.nanos
            .fetch_add(dur.as_nanos() as u64, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_nanos(&self) -> u64 {
        self.nanos.load(std::sync::atomic::Ordering::SeqCst)
    }
}
