#![doc = include_str!("../README.md")]
//!
//! # Module Map
//!
//! - [`clock`]: monotonic time source used for every timestamp the core records.
//! - [`error`]: the error taxonomy surfaced by construction and loads.
//! - [`entry`]: per-key entry records and their Live/Expiring/Removed lifecycle.
//! - [`sketch`]: the count-min frequency sketch backing Window-TinyLFU and the
//!   enhanced LRU/LFU policies.
//! - [`policy`]: the pluggable eviction policies (LRU, LFU, FIFO/FILO,
//!   weight-based, idle-time, Window-TinyLFU, and composite).
//! - [`lifecycle`]: capacity accounting and eviction-reason bookkeeping.
//! - [`index`]: the concurrent, sharded key→entry map.
//! - [`stats`]: counters and listener event dispatch.
//! - [`config`]: [`CacheBuilder`], the single entry point for constructing a cache.
//! - [`engine`]: [`Cache`], the synchronous cache engine.
//! - [`future`]: the async `get_or_load_async` surface (requires the `async` feature).

pub mod clock;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
#[cfg(feature = "async")]
pub mod future;
pub mod index;
pub mod lifecycle;
pub mod policy;
pub mod sketch;
pub mod stats;

pub use config::{CacheBuilder, SketchKind};
pub use engine::Cache;
pub use error::{ConfigError, LoadError};
pub use policy::PolicyKind;
pub use stats::{named, Event, Listener, Snapshot, Stats};
