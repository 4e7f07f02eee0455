use crate::cache::SlruCache;
use crate::config::{
  default_shard_count, floor_power_of_two, ResurrectionPolicy, SlruConfig,
  DEFAULT_TOUCH_BUFFER_CAPACITY, DEFAULT_YOUNGER_SIZE_FRACTION,
};
use crate::error::BuildError;
use crate::hooks::{CacheHooks, NoopHooks};
use crate::listener::EvictionListener;
use crate::memory::{MemoryTracker, MemoryTrackingHooks, OverBudgetPolicy};
use crate::metrics::Metrics;
use crate::shard::Shard;
use crate::shared::CacheShared;
use crate::task::notifier::Notifier;
use crate::value::{unit_weigher, Weigher};

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// A builder for [`SlruCache`] instances.
pub struct SlruCacheBuilder<K: Send, V: Send, H = ahash::RandomState> {
  pub(crate) capacity: u64,
  pub(crate) younger_size_fraction: f64,
  pub(crate) shards: Option<usize>,
  pub(crate) touch_buffer_capacity: usize,
  pub(crate) resurrection: ResurrectionPolicy,
  pub(crate) hasher: H,
  weigher: Option<Weigher<V>>,
  hooks: Option<Arc<dyn CacheHooks<K, V>>>,
  memory_tracker: Option<(Arc<dyn MemoryTracker>, OverBudgetPolicy)>,
  listener: Option<Arc<dyn EvictionListener<K, V>>>,
  _key_marker: PhantomData<K>,
}

impl<K: Send, V: Send, H> fmt::Debug for SlruCacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlruCacheBuilder")
      .field("capacity", &self.capacity)
      .field("younger_size_fraction", &self.younger_size_fraction)
      .field("shards", &self.shards)
      .field("touch_buffer_capacity", &self.touch_buffer_capacity)
      .field("resurrection", &self.resurrection)
      .field("has_weigher", &self.weigher.is_some())
      .field("has_hooks", &self.hooks.is_some())
      .field("has_memory_tracker", &self.memory_tracker.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K: Send, V: Send, H> SlruCacheBuilder<K, V, H> {
  /// Sets the maximum total weight of the cache.
  pub fn capacity(mut self, capacity: u64) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the cache to be "unbounded". Nothing is ever evicted for capacity.
  pub fn unbounded(mut self) -> Self {
    self.capacity = u64::MAX;
    self
  }

  /// Sets the share of the capacity targeted by the younger segment.
  /// Must lie strictly between 0 and 1.
  pub fn younger_size_fraction(mut self, fraction: f64) -> Self {
    self.younger_size_fraction = fraction;
    self
  }

  /// Sets the number of concurrent shards to use.
  ///
  /// Capacity is split evenly between shards and each shard enforces its own
  /// share, so a value heavier than `capacity / shards` is evicted right after
  /// admission. Left unset, the count follows the CPU count but never drops a
  /// shard's share below [`MIN_SHARD_CAPACITY`](crate::config::MIN_SHARD_CAPACITY).
  pub fn shards(mut self, shards: usize) -> Self {
    // A power of two, so the shard index is a mask of the hash.
    self.shards = Some(if shards == 0 { 0 } else { shards.next_power_of_two() });
    self
  }

  /// Sets how many touches each shard buffers before applying them inline.
  pub fn touch_buffer_capacity(mut self, capacity: usize) -> Self {
    self.touch_buffer_capacity = capacity;
    self
  }

  pub fn resurrection(mut self, policy: ResurrectionPolicy) -> Self {
    self.resurrection = policy;
    self
  }

  /// Sets the function that assigns a weight to each value. Defaults to `1`
  /// for every value, turning capacity into an item count.
  pub fn weigher(mut self, weigher: impl Fn(&V) -> u64 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(weigher));
    self
  }

  /// Sets the admission and removal hooks.
  pub fn hooks<Hooks>(mut self, hooks: Hooks) -> Self
  where
    Hooks: CacheHooks<K, V> + 'static,
  {
    self.hooks = Some(Arc::new(hooks));
    self
  }

  /// Charges every resident value's weight to `tracker`.
  ///
  /// The configured hooks, if any, are wrapped in a [`MemoryTrackingHooks`]
  /// when the cache is built.
  pub fn memory_tracker(mut self, tracker: Arc<dyn MemoryTracker>, policy: OverBudgetPolicy) -> Self {
    self.memory_tracker = Some((tracker, policy));
    self
  }

  /// Sets the eviction listener for the cache.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Sets the hasher used both to pick shards and inside each shard.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    SlruConfig {
      capacity: self.capacity,
      younger_size_fraction: self.younger_size_fraction,
      shard_count: self.shards,
      touch_buffer_capacity: self.touch_buffer_capacity,
      resurrection: self.resurrection,
    }
    .validate()
  }
}

// --- Default Constructor ---
impl<K: Send, V: Send, H: BuildHasher + Default> SlruCacheBuilder<K, V, H> {
  /// Creates a new `SlruCacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      capacity: u64::MAX,
      younger_size_fraction: DEFAULT_YOUNGER_SIZE_FRACTION,
      shards: None,
      touch_buffer_capacity: DEFAULT_TOUCH_BUFFER_CAPACITY,
      resurrection: ResurrectionPolicy::default(),
      hasher: H::default(),
      weigher: None,
      hooks: None,
      memory_tracker: None,
      listener: None,
      _key_marker: PhantomData,
    }
  }

  /// Creates a builder preloaded from a plain configuration.
  pub fn from_config(config: &SlruConfig) -> Self {
    let builder = Self::new()
      .capacity(config.capacity)
      .younger_size_fraction(config.younger_size_fraction)
      .touch_buffer_capacity(config.touch_buffer_capacity)
      .resurrection(config.resurrection);
    match config.shard_count {
      Some(shards) => builder.shards(shards),
      None => builder,
    }
  }
}

impl<K: Send, V: Send> Default for SlruCacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(feature = "rapidhash")]
impl<K: Send, V: Send> SlruCacheBuilder<K, V, rapidhash::RapidRandomState> {
  pub fn rapidhash() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> SlruCacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds the cache.
  pub fn build(self) -> Result<SlruCache<K, V, H>, BuildError> {
    self.validate()?;
    Ok(SlruCache {
      shared: Arc::new(self.build_shared_core()),
    })
  }

  /// Central logic to construct the shared core of the cache.
  fn build_shared_core(self) -> CacheShared<K, V, H> {
    let mut shards = self
      .shards
      .unwrap_or_else(|| default_shard_count(self.capacity));
    // Every shard needs at least one unit of capacity.
    if self.capacity < shards as u64 {
      shards = floor_power_of_two(self.capacity) as usize;
      tracing::debug!(
        requested = ?self.shards,
        shards,
        capacity = self.capacity,
        "shard count reduced to fit capacity"
      );
    }

    let hooks: Arc<dyn CacheHooks<K, V>> = {
      let inner = self
        .hooks
        .unwrap_or_else(|| Arc::new(NoopHooks) as Arc<dyn CacheHooks<K, V>>);
      match self.memory_tracker {
        Some((tracker, policy)) => Arc::new(MemoryTrackingHooks::new(inner, tracker, policy)),
        None => inner,
      }
    };

    let shard_vec: Vec<_> = (0..shards)
      .map(|index| {
        CachePadded::new(Shard::new(
          index,
          self.hasher.clone(),
          self.touch_buffer_capacity,
        ))
      })
      .collect();

    tracing::debug!(
      capacity = self.capacity,
      shards,
      younger_size_fraction = self.younger_size_fraction,
      resurrection = ?self.resurrection,
      "building slru cache"
    );

    CacheShared {
      shards: shard_vec.into_boxed_slice(),
      hasher: self.hasher,
      capacity: AtomicU64::new(self.capacity),
      younger_fraction: AtomicU64::new(self.younger_size_fraction.to_bits()),
      weigher: self.weigher.unwrap_or_else(unit_weigher),
      hooks,
      resurrection: self.resurrection,
      metrics: Metrics::new(),
      notifier: self.listener.map(Notifier::spawn),
    }
  }
}
