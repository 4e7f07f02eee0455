use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// The cache was configured with a capacity of zero. Use `unbounded()` for
  /// a cache that never evicts.
  #[error("bounded cache capacity cannot be zero")]
  ZeroCapacity,
  /// The cache was configured with zero shards.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// Each shard needs room for at least one buffered touch.
  #[error("touch buffer capacity cannot be zero")]
  ZeroTouchBuffer,
  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Errors returned when runtime limits are rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  #[error("capacity cannot be reconfigured to zero")]
  ZeroCapacity,
  #[error("younger size fraction must lie strictly between 0 and 1, got {0}")]
  InvalidYoungerFraction(f64),
}

/// The outcome of a failed population, shared by every waiter of that key.
#[derive(Debug, Clone, Error)]
pub enum InsertError {
  /// The producer dropped its insert cookie without resolving it.
  #[error("insertion aborted")]
  Aborted,
  /// The producer cancelled the insertion with its own error.
  #[error("population failed: {0}")]
  Failed(Arc<dyn StdError + Send + Sync>),
  /// An evicted value for this key is still referenced elsewhere and the
  /// cache was built with `ResurrectionPolicy::Forbid`.
  #[error("an evicted value for this key is still referenced and resurrection is forbidden")]
  StaleValueAlive,
}

impl InsertError {
  /// Wraps a producer error so it can be handed to every waiter.
  ///
  /// Accepts anything boxable as an error, including `&str` and `String`.
  pub fn failed(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
    InsertError::Failed(Arc::from(error.into()))
  }

  pub fn is_aborted(&self) -> bool {
    matches!(self, InsertError::Aborted)
  }
}
