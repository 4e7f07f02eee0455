use crate::error::{BuildError, ConfigError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Share of the capacity reserved for the younger (probationary) segment.
pub const DEFAULT_YOUNGER_SIZE_FRACTION: f64 = 0.25;

/// Number of buffered touches per shard before an inline drain.
pub const DEFAULT_TOUCH_BUFFER_CAPACITY: usize = 1024;

/// A derived shard count never leaves a shard with less capacity than this.
pub const MIN_SHARD_CAPACITY: u64 = 1024;

/// Decides what happens when a key is inserted again while a value evicted
/// for that key is still referenced outside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResurrectionPolicy {
  /// `begin_insert` re-admits the still-alive value instead of asking the
  /// caller for a new population.
  #[default]
  Allow,
  /// `begin_insert` refuses the key with `InsertError::StaleValueAlive` until
  /// every outside reference to the evicted value is gone.
  Forbid,
}

/// Plain configuration for a [`SlruCache`](crate::SlruCache).
///
/// This is the shape an external configuration layer hands to
/// [`SlruCacheBuilder::from_config`](crate::SlruCacheBuilder::from_config).
/// Capacity and the younger fraction can later be changed at runtime through
/// [`SlruCache::reconfigure`](crate::SlruCache::reconfigure).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SlruConfig {
  /// Maximum total weight of all cached values.
  pub capacity: u64,
  /// Fraction of `capacity` targeted by the younger segment, in `(0, 1)`.
  pub younger_size_fraction: f64,
  /// Number of independently locked shards. Rounded up to a power of two.
  ///
  /// Every shard enforces its own share of `capacity`, so a value heavier
  /// than `capacity / shard_count` cannot stay cached. `None` derives the
  /// count from the CPU count and the capacity, keeping at least
  /// [`MIN_SHARD_CAPACITY`] per shard.
  pub shard_count: Option<usize>,
  /// Buffered touches per shard.
  pub touch_buffer_capacity: usize,
  pub resurrection: ResurrectionPolicy,
}

impl Default for SlruConfig {
  fn default() -> Self {
    Self {
      capacity: u64::MAX,
      younger_size_fraction: DEFAULT_YOUNGER_SIZE_FRACTION,
      shard_count: None,
      touch_buffer_capacity: DEFAULT_TOUCH_BUFFER_CAPACITY,
      resurrection: ResurrectionPolicy::default(),
    }
  }
}

impl SlruConfig {
  pub fn new(capacity: u64) -> Self {
    Self {
      capacity,
      ..Self::default()
    }
  }

  /// Checks every field the cache cannot work with.
  pub fn validate(&self) -> Result<(), BuildError> {
    if self.capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if self.shard_count == Some(0) {
      return Err(BuildError::ZeroShards);
    }
    if self.touch_buffer_capacity == 0 {
      return Err(BuildError::ZeroTouchBuffer);
    }
    validate_younger_fraction(self.younger_size_fraction)?;
    Ok(())
  }
}

pub(crate) fn validate_younger_fraction(fraction: f64) -> Result<(), ConfigError> {
  // Written this way so NaN is rejected too.
  if fraction > 0.0 && fraction < 1.0 {
    Ok(())
  } else {
    Err(ConfigError::InvalidYoungerFraction(fraction))
  }
}

/// The shard count used when none is configured.
pub(crate) fn default_shard_count(capacity: u64) -> usize {
  let by_cpus = (num_cpus::get() * 4).max(1).next_power_of_two() as u64;
  let by_capacity = floor_power_of_two(capacity / MIN_SHARD_CAPACITY);
  by_cpus.min(by_capacity) as usize
}

/// Largest power of two not above `n`, and at least 1.
pub(crate) fn floor_power_of_two(n: u64) -> u64 {
  1 << (u64::BITS - 1 - n.max(1).leading_zeros())
}
