use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use generational_arena::Index;

struct TouchSlot {
  slot: AtomicUsize,
  generation: AtomicU64,
}

/// A fixed-size staging area for recent accesses to a shard.
///
/// Readers record touches holding only the shard's read lock: they claim a
/// slot with a single `fetch_add` on the write position and store the arena
/// index there. The buffer is drained under the shard's write lock.
///
/// Recency tracking is best-effort. A reader that claimed a slot before a
/// drain may finish writing it after the drain, and a torn slot may name a
/// stale or different node. Stale indices are rejected by the arena's
/// generation check; anything else only perturbs LRU order.
pub(crate) struct TouchBuffer {
  slots: Box<[TouchSlot]>,
  position: AtomicUsize,
}

impl TouchBuffer {
  pub(crate) fn new(capacity: usize) -> Self {
    let slots = (0..capacity)
      .map(|_| TouchSlot {
        slot: AtomicUsize::new(0),
        generation: AtomicU64::new(0),
      })
      .collect();
    Self {
      slots,
      position: AtomicUsize::new(0),
    }
  }

  /// Records a touch. Returns `true` when the buffer is full and the caller
  /// must drain it before returning.
  #[inline]
  pub(crate) fn push(&self, index: Index) -> bool {
    let position = self.position.fetch_add(1, Ordering::AcqRel);
    let capacity = self.slots.len();
    if position >= capacity {
      // Dropped. Someone is about to drain.
      return true;
    }
    let (slot, generation) = index.into_raw_parts();
    let target = &self.slots[position];
    target.slot.store(slot, Ordering::Relaxed);
    target.generation.store(generation, Ordering::Release);
    position + 1 == capacity
  }

  /// Hands every buffered index to `f` and resets the buffer.
  ///
  /// Must be called with the owning shard's write lock held.
  pub(crate) fn drain(&self, mut f: impl FnMut(Index)) {
    let filled = self.position.swap(0, Ordering::AcqRel).min(self.slots.len());
    for target in &self.slots[..filled] {
      let generation = target.generation.load(Ordering::Acquire);
      let slot = target.slot.load(Ordering::Relaxed);
      f(Index::from_raw_parts(slot, generation));
    }
  }

  /// Forgets every buffered touch without applying it.
  pub(crate) fn discard(&self) {
    self.position.store(0, Ordering::Release);
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.position.load(Ordering::Acquire).min(self.slots.len())
  }
}
