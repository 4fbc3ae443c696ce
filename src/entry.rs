//! Entry Record (spec.md §3, "Entry Record").
//!
//! One record lives per key in the [`crate::index::EntryIndex`]. Records
//! carry their own expiration configuration and a small atomic state tag
//! instead of being protected by a coarse lock, so that a reader checking
//! freshness never blocks a writer touching a different key.
//!
//! # State machine
//!
//! `Live -> Expiring -> Removed`. Transitions are monotonic and enforced
//! with compare-and-swap: `Removed` is terminal, and a reader that observes
//! `Expiring` treats the record as absent without waiting for whoever is
//! mid-transition to finish unlinking it (spec.md §4.3, §9 "Entry state
//! machine under concurrency").

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// The lifecycle state of an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Visible to readers and eligible for policy bookkeeping.
    Live = 0,
    /// A removal/expiration is in flight; readers must treat this as a miss.
    Expiring = 1,
    /// Terminal. The record is being or has been unlinked from the index.
    Removed = 2,
}

impl State {
    fn from_u8(raw: u8) -> State {
        match raw {
            0 => State::Live,
            1 => State::Expiring,
            _ => State::Removed,
        }
    }
}

/// An atomic state tag supporting the monotonic `Live -> Expiring -> Removed`
/// transition without a lock.
#[derive(Debug)]
pub struct StateTag(AtomicU8);

impl StateTag {
    pub fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts to move `Live -> Expiring`. Returns `true` if this call won
    /// the race; a losing caller must treat the record as already being
    /// torn down by someone else.
    pub fn begin_expire(&self) -> bool {
        self.0
            .compare_exchange(
                State::Live as u8,
                State::Expiring as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Finalizes `Expiring -> Removed`. Only the winner of `begin_expire`
    /// should call this.
    pub fn finish_remove(&self) {
        self.0.store(State::Removed as u8, Ordering::Release);
    }
}

/// Optional per-record expiration policy, configured once at cache
/// construction (spec.md §6: `expire_after_write`, `expire_after_access`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationPolicy {
    pub expire_after_write: Option<Duration>,
    pub expire_after_access: Option<Duration>,
}

impl ExpirationPolicy {
    pub fn is_enabled(&self) -> bool {
        self.expire_after_write.is_some() || self.expire_after_access.is_some()
    }
}

/// One entry in the cache: a value, its weight, timestamps, and lifecycle
/// state (spec.md §3 "Entry Record").
///
/// The key itself is not stored here — the index already maps `K` to this
/// record, and policies keep their own key-bearing nodes (spec.md §4.2:
/// "Policies hold only key references").
pub struct Entry<V> {
    value: V,
    weight: u64,
    created_at: AtomicU64,
    last_access_at: AtomicU64,
    state: StateTag,
}

impl<V> Entry<V> {
    /// Creates a new `Live` entry stamped with `now_nanos` as both creation
    /// and last-access time.
    pub fn new(value: V, weight: u64, now_nanos: u64) -> Self {
        Self {
            value,
            weight,
            created_at: AtomicU64::new(now_nanos),
            last_access_at: AtomicU64::new(now_nanos),
            state: StateTag::new(State::Live),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn created_at(&self) -> u64 {
        self.created_at.load(Ordering::Acquire)
    }

    pub fn last_access_at(&self) -> u64 {
        self.last_access_at.load(Ordering::Acquire)
    }

    pub fn state(&self) -> &StateTag {
        &self.state
    }

    /// Records a read: bumps `last_access_at` to `now_nanos`.
    pub fn touch(&self, now_nanos: u64) {
        self.last_access_at.store(now_nanos, Ordering::Release);
    }

    /// Returns whether this entry has exceeded `policy`'s configured
    /// durations as of `now_nanos` (spec.md §4.4 "Expiration").
    pub fn is_expired(&self, policy: &ExpirationPolicy, now_nanos: u64) -> bool {
        if let Some(ttl) = policy.expire_after_write {
            if now_nanos.saturating_sub(self.created_at()) >= ttl.as_nanos() as u64 {
                return true;
            }
        }
        if let Some(tti) = policy.expire_after_access {
            if now_nanos.saturating_sub(self.last_access_at()) >= tti.as_nanos() as u64 {
                return true;
            }
        }
        false
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("value", &self.value)
            .field("weight", &self.weight)
            .field("created_at", &self.created_at())
            .field("last_access_at", &self.last_access_at())
            .field("state", &self.state.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_live() {
        let entry = Entry::new("value", 1, 0);
        assert_eq!(entry.state().load(), State::Live);
        assert_eq!(*entry.value(), "value");
    }

    #[test]
    fn begin_expire_is_single_winner() {
        let entry = Entry::new("v", 1, 0);
        assert!(entry.state().begin_expire());
        assert!(!entry.state().begin_expire());
        assert_eq!(entry.state().load(), State::Expiring);
    }

    #[test]
    fn finish_remove_is_terminal() {
        let entry = Entry::new("v", 1, 0);
        entry.state().begin_expire();
        entry.state().finish_remove();
        assert_eq!(entry.state().load(), State::Removed);
    }

    #[test]
    fn expire_after_write_triggers_once_duration_elapsed() {
        let policy = ExpirationPolicy {
            expire_after_write: Some(Duration::from_millis(100)),
            expire_after_access: None,
        };
        let entry = Entry::new("v", 1, 0);
        assert!(!entry.is_expired(&policy, 50_000_000));
        assert!(entry.is_expired(&policy, 100_000_000));
    }

    #[test]
    fn expire_after_access_resets_on_touch() {
        let policy = ExpirationPolicy {
            expire_after_write: None,
            expire_after_access: Some(Duration::from_millis(100)),
        };
        let entry = Entry::new("v", 1, 0);
        entry.touch(50_000_000);
        assert!(!entry.is_expired(&policy, 120_000_000));
        assert!(entry.is_expired(&policy, 151_000_000));
    }

    #[test]
    fn disabled_policy_never_expires() {
        let policy = ExpirationPolicy::default();
        let entry = Entry::new("v", 1, 0);
        assert!(!entry.is_expired(&policy, u64::MAX));
    }
}
