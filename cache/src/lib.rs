//! A sharded, weight-bounded, segmented-LRU cache with single-flight
//! population.
//!
//! # Features
//! - **Weight-Bounded**: Capacity is a total weight, assigned per value by a
//!   user-supplied weigher. The default weigher counts items.
//! - **Segmented LRU**: New values land in a probationary *younger* segment and
//!   only a second access promotes them to the protected *older* segment, so a
//!   single scan cannot flush the working set.
//! - **Single-Flight**: Concurrent callers missing the same key share one
//!   population through [`InsertCookie`] and [`ValueFuture`], usable from both
//!   threads and `async` code.
//! - **High Concurrency**: Each shard has its own lock. Reads record accesses
//!   into a lock-free touch buffer instead of reordering lists.
//! - **Hooks**: Admission and removal hooks, a memory-accounting decorator and
//!   an asynchronous eviction listener.
//! - **Resurrection Control**: Decide whether an evicted value that is still
//!   referenced elsewhere may be re-admitted under its key.
//!
//! # Example
//!
//! ```
//! use fibre_slru::SlruCacheBuilder;
//!
//! let cache = SlruCacheBuilder::<String, Vec<u8>>::new()
//!   .capacity(1024)
//!   .weigher(|value: &Vec<u8>| value.len() as u64)
//!   .build()
//!   .unwrap();
//!
//! let key = "blob".to_string();
//! if cache.find(&key).is_none() {
//!   let mut cookie = cache.begin_insert(key.clone());
//!   if cookie.is_active() {
//!     cookie.end_insert(vec![0u8; 100]);
//!   }
//! }
//! assert_eq!(cache.find(&key).unwrap().len(), 100);
//! assert_eq!(cache.weight(), 100);
//! ```

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod hooks;
pub mod listener;
pub mod memory;
pub mod metrics;

// Internal, crate-only modules
mod cache;
mod cookie;
mod future;
mod item;
mod segment;
mod shard;
mod shared;
mod task;
mod touch;
mod value;

// Re-export the primary user-facing types for convenience
pub use builder::SlruCacheBuilder;
pub use cache::SlruCache;
pub use config::{ResurrectionPolicy, SlruConfig};
pub use cookie::InsertCookie;
pub use error::{BuildError, ConfigError, InsertError};
pub use future::ValueFuture;
pub use hooks::{AdmissionDecision, CacheHooks, NoopHooks};
pub use listener::{EvictionListener, EvictionReason};
pub use memory::{MemoryTracker, MemoryTrackingHooks, MemoryUsageTracker, OverBudgetPolicy};
pub use metrics::MetricsSnapshot;
pub use segment::SegmentKind;
pub use value::{CacheValue, Weigher};
