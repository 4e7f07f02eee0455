use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) sync_hits: CachePadded<AtomicU64>,
  pub(crate) async_hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) sync_hit_weight: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) cancellations: CachePadded<AtomicU64>,
  pub(crate) admissions_declined: CachePadded<AtomicU64>,
  pub(crate) resurrections: CachePadded<AtomicU64>,
  pub(crate) weight_updates: CachePadded<AtomicU64>,

  // --- Removal Stats ---
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) invalidations: CachePadded<AtomicU64>,
  pub(crate) cleared: CachePadded<AtomicU64>,

  // --- Weight ---
  pub(crate) current_weight: CachePadded<AtomicU64>,
  pub(crate) total_weight_added: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      sync_hits: CachePadded::new(AtomicU64::new(0)),
      async_hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      sync_hit_weight: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      cancellations: CachePadded::new(AtomicU64::new(0)),
      admissions_declined: CachePadded::new(AtomicU64::new(0)),
      resurrections: CachePadded::new(AtomicU64::new(0)),
      weight_updates: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      cleared: CachePadded::new(AtomicU64::new(0)),
      current_weight: CachePadded::new(AtomicU64::new(0)),
      total_weight_added: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_sync_hit(&self, weight: u64) {
    self.sync_hits.fetch_add(1, Ordering::Relaxed);
    self.sync_hit_weight.fetch_add(weight, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_admitted(&self, weight: u64) {
    self.current_weight.fetch_add(weight, Ordering::Relaxed);
    self.total_weight_added.fetch_add(weight, Ordering::Relaxed);
  }

  pub(crate) fn record_reweigh(&self, old_weight: u64, new_weight: u64) {
    self.weight_updates.fetch_add(1, Ordering::Relaxed);
    if new_weight >= old_weight {
      self.record_admitted(new_weight - old_weight);
    } else {
      self
        .current_weight
        .fetch_sub(old_weight - new_weight, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let sync_hits = self.sync_hits.load(Ordering::Relaxed);
    let async_hits = self.async_hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let hits = sync_hits + async_hits;
    let total_lookups = hits + misses;

    MetricsSnapshot {
      sync_hits,
      async_hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      sync_hit_weight: self.sync_hit_weight.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      cancellations: self.cancellations.load(Ordering::Relaxed),
      admissions_declined: self.admissions_declined.load(Ordering::Relaxed),
      resurrections: self.resurrections.load(Ordering::Relaxed),
      weight_updates: self.weight_updates.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      cleared: self.cleared.load(Ordering::Relaxed),
      current_weight: self.current_weight.load(Ordering::Relaxed),
      total_weight_added: self.total_weight_added.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups answered with a resident value.
  pub sync_hits: u64,
  /// Lookups that found a population in flight and received its future.
  pub async_hits: u64,
  /// Lookups that found nothing usable.
  pub misses: u64,
  /// (sync_hits + async_hits) / (sync_hits + async_hits + misses).
  pub hit_ratio: f64,
  /// Summed weight of the values returned by sync hits.
  pub sync_hit_weight: u64,
  /// Values admitted through `end_insert`.
  pub inserts: u64,
  /// Populations that were cancelled or abandoned.
  pub cancellations: u64,
  /// Values handed to waiters but refused by the admission hook.
  pub admissions_declined: u64,
  /// Evicted values that were re-admitted by `begin_insert`.
  pub resurrections: u64,
  /// Successful `update_weight` calls.
  pub weight_updates: u64,
  /// Items evicted to stay within capacity.
  pub evicted_by_capacity: u64,
  /// Items removed by `try_remove`.
  pub invalidations: u64,
  /// Items dropped by `clear`.
  pub cleared: u64,
  /// Weight currently accounted to resident items.
  pub current_weight: u64,
  /// Cumulative weight of everything ever admitted.
  pub total_weight_added: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("sync_hits", &self.sync_hits)
      .field("async_hits", &self.async_hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("sync_hit_weight", &self.sync_hit_weight)
      .field("inserts", &self.inserts)
      .field("cancellations", &self.cancellations)
      .field("admissions_declined", &self.admissions_declined)
      .field("resurrections", &self.resurrections)
      .field("weight_updates", &self.weight_updates)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("invalidations", &self.invalidations)
      .field("cleared", &self.cleared)
      .field("current_weight", &self.current_weight)
      .field("total_weight_added", &self.total_weight_added)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
