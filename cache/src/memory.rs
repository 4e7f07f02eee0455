//! Charging cached weight against an external memory budget.
//!
//! [`MemoryTrackingHooks`] wraps any [`CacheHooks`] and mirrors every admitted,
//! removed and re-weighed value into a [`MemoryTracker`]. The cache's own
//! capacity keeps bounding it as usual; the tracker adds a second, possibly
//! process-wide, budget on top.

use crate::hooks::{AdmissionDecision, CacheHooks};
use crate::listener::EvictionReason;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A counter of memory in use, usually shared by several consumers.
pub trait MemoryTracker: Send + Sync {
  /// Amount currently charged.
  fn usage(&self) -> u64;

  /// The budget, if any.
  fn limit(&self) -> Option<u64>;

  fn acquire(&self, amount: u64);

  fn release(&self, amount: u64);

  /// Returns `true` if `amount` more would still fit within the limit.
  fn has_room(&self, amount: u64) -> bool {
    self
      .limit()
      .map_or(true, |limit| self.usage().saturating_add(amount) <= limit)
  }
}

/// A lock-free [`MemoryTracker`] with an optional limit.
#[derive(Debug, Default)]
pub struct MemoryUsageTracker {
  // Signed so that a release racing ahead of its acquire cannot wrap.
  usage: AtomicI64,
  limit: Option<u64>,
}

impl MemoryUsageTracker {
  pub fn new(limit: Option<u64>) -> Self {
    Self {
      usage: AtomicI64::new(0),
      limit,
    }
  }

  pub fn unlimited() -> Self {
    Self::new(None)
  }

  pub fn with_limit(limit: u64) -> Self {
    Self::new(Some(limit))
  }
}

impl MemoryTracker for MemoryUsageTracker {
  fn usage(&self) -> u64 {
    self.usage.load(Ordering::Acquire).max(0) as u64
  }

  fn limit(&self) -> Option<u64> {
    self.limit
  }

  fn acquire(&self, amount: u64) {
    self.usage.fetch_add(clamp(amount), Ordering::AcqRel);
  }

  fn release(&self, amount: u64) {
    self.usage.fetch_sub(clamp(amount), Ordering::AcqRel);
  }
}

fn clamp(amount: u64) -> i64 {
  i64::try_from(amount).unwrap_or(i64::MAX)
}

/// What [`MemoryTrackingHooks`] does with a value that does not fit the
/// tracker's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverBudgetPolicy {
  /// Cache it anyway and log a warning.
  #[default]
  Admit,
  /// Decline admission. Waiters still receive the value.
  Decline,
}

/// A [`CacheHooks`] decorator that charges a [`MemoryTracker`] by each
/// resident value's weight.
pub struct MemoryTrackingHooks<H> {
  inner: H,
  tracker: Arc<dyn MemoryTracker>,
  policy: OverBudgetPolicy,
}

impl<H> MemoryTrackingHooks<H> {
  pub fn new(inner: H, tracker: Arc<dyn MemoryTracker>, policy: OverBudgetPolicy) -> Self {
    Self {
      inner,
      tracker,
      policy,
    }
  }

  pub fn tracker(&self) -> &Arc<dyn MemoryTracker> {
    &self.tracker
  }

  pub fn inner(&self) -> &H {
    &self.inner
  }
}

impl<H> fmt::Debug for MemoryTrackingHooks<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryTrackingHooks")
      .field("usage", &self.tracker.usage())
      .field("limit", &self.tracker.limit())
      .field("policy", &self.policy)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> CacheHooks<K, V> for MemoryTrackingHooks<H>
where
  H: CacheHooks<K, V>,
{
  fn admit(&self, key: &K, value: &Arc<V>, weight: u64) -> AdmissionDecision {
    if self.policy == OverBudgetPolicy::Decline && !self.tracker.has_room(weight) {
      tracing::debug!(
        weight,
        usage = self.tracker.usage(),
        "memory budget exhausted, declining admission"
      );
      return AdmissionDecision::Decline;
    }
    self.inner.admit(key, value, weight)
  }

  fn on_admitted(&self, key: &K, value: &Arc<V>, weight: u64) {
    if self.policy == OverBudgetPolicy::Admit && !self.tracker.has_room(weight) {
      tracing::warn!(
        weight,
        usage = self.tracker.usage(),
        limit = self.tracker.limit(),
        "memory budget exceeded by cached value"
      );
    }
    self.tracker.acquire(weight);
    self.inner.on_admitted(key, value, weight);
  }

  fn on_removed(&self, key: &K, value: &Arc<V>, weight: u64, reason: EvictionReason) {
    self.tracker.release(weight);
    self.inner.on_removed(key, value, weight, reason);
  }

  fn on_weight_updated(&self, key: &K, value: &Arc<V>, old_weight: u64, new_weight: u64) {
    if new_weight >= old_weight {
      self.tracker.acquire(new_weight - old_weight);
    } else {
      self.tracker.release(old_weight - new_weight);
    }
    self.inner.on_weight_updated(key, value, old_weight, new_weight);
  }
}
