//! Error taxonomy (spec.md §7).
//!
//! Only two failure classes are surfaced to callers: misconfiguration at
//! construction time, and a user-supplied loader rejecting a load. Every
//! other failure mode named in spec.md §7 (listener panics, CAS races) is
//! absorbed internally and recorded in [`crate::stats::Stats`] instead.

use thiserror::Error;

/// Errors returned by [`crate::config::CacheBuilder::build`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `maximum_size` or `maximum_weight` was set to zero.
    #[error("capacity must be a positive value")]
    NonPositiveCapacity,

    /// Both `maximum_size` and `maximum_weight` were configured; they are
    /// mutually exclusive per spec.md §6.
    #[error("maximum_size and maximum_weight are mutually exclusive")]
    ConflictingLimits,

    /// `maximum_weight` was set without a `weigher`.
    #[error("maximum_weight requires a weigher to be configured")]
    MissingWeigher,

    /// Neither `maximum_size` nor `maximum_weight` was configured.
    #[error("a cache must have either maximum_size or maximum_weight set")]
    NoCapacityConfigured,

    /// The requested protected-segment ratio for Window-TinyLFU is outside
    /// `(0.0, 1.0)`.
    #[error("protected ratio must be strictly between 0.0 and 1.0")]
    InvalidProtectedRatio,
}

/// The outcome of a failed load, as surfaced by `compute_if_absent` and
/// `get_or_load_async`.
///
/// Distinguishes a loader returning an error from cancellation, per
/// spec.md §5 ("Cancellation: ... waiters observe a cancelled error").
#[derive(Debug, Error, Clone)]
pub enum LoadError<E> {
    /// The caller-supplied loader returned an error.
    #[error("loader failed: {0}")]
    Failed(E),

    /// The in-flight load was cancelled before it completed.
    #[error("load was cancelled")]
    Cancelled,
}

impl<E> LoadError<E> {
    /// Returns the wrapped loader error, if this is the `Failed` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            LoadError::Failed(e) => Some(e),
            LoadError::Cancelled => None,
        }
    }
}
