use crate::item::{Item, Node};
use crate::listener::EvictionReason;
use crate::segment::{Lane, Segment, SegmentKind};
use crate::touch::TouchBuffer;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, Weak};

use generational_arena::{Arena, Index};
use parking_lot::RwLock;

/// Below this many entries the resurrection map is never swept.
const TRACKED_PURGE_FLOOR: usize = 64;

/// A value that left a shard and must be reported once the lock is released.
pub(crate) struct Removal<K, V> {
  pub(crate) key: K,
  pub(crate) value: Arc<V>,
  pub(crate) weight: u64,
  pub(crate) reason: EvictionReason,
}

/// Per-shard weight limits derived from the cache-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ShardLimits {
  pub(crate) capacity: u64,
  pub(crate) younger_capacity: u64,
}

impl ShardLimits {
  pub(crate) fn new(capacity: u64, younger_fraction: f64) -> Self {
    Self {
      capacity,
      younger_capacity: (capacity as f64 * younger_fraction) as u64,
    }
  }

  #[inline]
  pub(crate) fn older_capacity(&self) -> u64 {
    self.capacity.saturating_sub(self.younger_capacity)
  }
}


/// Everything a shard owns behind its lock.
pub(crate) struct ShardState<K, V, H> {
  pub(crate) items: HashMap<K, Item<V>, H>,
  pub(crate) nodes: Arena<Node<K, V>>,
  younger: Segment,
  protected: Segment,
  demoted: Segment,
  // Evicted values that may still be alive outside the cache.
  tracked: HashMap<K, Weak<V>, H>,
}

/// One independently locked partition of the cache.
pub(crate) struct Shard<K, V, H> {
  /// Position in the cache's shard table.
  pub(crate) index: usize,
  pub(crate) state: RwLock<ShardState<K, V, H>>,
  pub(crate) touches: TouchBuffer,
}

impl<K, V, H> Shard<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(index: usize, hasher: H, touch_buffer_capacity: usize) -> Self {
    Self {
      index,
      state: RwLock::new(ShardState::new(hasher)),
      touches: TouchBuffer::new(touch_buffer_capacity),
    }
  }
}

impl<K, V, H> ShardState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(hasher: H) -> Self {
    Self {
      items: HashMap::with_hasher(hasher.clone()),
      nodes: Arena::new(),
      younger: Segment::new(),
      protected: Segment::new(),
      demoted: Segment::new(),
      tracked: HashMap::with_hasher(hasher),
    }
  }
}

impl<K, V, H> ShardState<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Returns the arena index and node of a resolved key.
  pub(crate) fn resolved<Q>(&self, key: &Q) -> Option<(Index, &Node<K, V>)>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.items.get(key)? {
      Item::Resolved(index) => Some((*index, &self.nodes[*index])),
      Item::Pending { .. } => None,
    }
  }

  /// Links a freshly resolved value at the head of the younger segment.
  pub(crate) fn insert_resolved(
    &mut self,
    key: K,
    value: Arc<V>,
    weight: u64,
    async_hits: u64,
  ) -> Index {
    let index = self
      .nodes
      .insert(Node::new(key.clone(), value, weight, async_hits));
    self.younger.push_front(&mut self.nodes, index);
    self.items.insert(key, Item::Resolved(index));
    index
  }

  /// Unlinks a resolved item and drops it from the map.
  ///
  /// With `track` set, a value that is still referenced elsewhere is
  /// remembered for resurrection; otherwise any memory of the key is dropped.
  pub(crate) fn remove(&mut self, index: Index, reason: EvictionReason, track: bool) -> Removal<K, V> {
    self.unlink(index);
    let node = self
      .nodes
      .remove(index)
      .expect("linked node must be present in the arena");
    self.items.remove(&node.key);
    if track {
      self.track(&node);
    } else {
      self.tracked.remove(&node.key);
    }

    if node.async_hits > 0 {
      tracing::trace!(async_hits = node.async_hits, %reason, "removing item that had async hits");
    }

    Removal {
      key: node.key,
      value: node.value,
      weight: node.weight,
      reason,
    }
  }

  /// Replaces the weight of a resolved item in place. Returns the old weight.
  pub(crate) fn reweigh(&mut self, index: Index, new_weight: u64) -> u64 {
    let node = &mut self.nodes[index];
    let old_weight = std::mem::replace(&mut node.weight, new_weight);
    let lane = node.lane;
    self.lane_mut(lane).reweigh(old_weight, new_weight);
    old_weight
  }

  /// Returns the evicted value still alive for `key`. A dead entry is
  /// forgotten on the way.
  pub(crate) fn tracked_alive(&mut self, key: &K) -> Option<Arc<V>> {
    match self.tracked.get(key)?.upgrade() {
      Some(value) => Some(value),
      None => {
        self.tracked.remove(key);
        None
      }
    }
  }

  pub(crate) fn forget_tracked(&mut self, key: &K) {
    self.tracked.remove(key);
  }

  /// Restores the weight invariants of this shard.
  ///
  /// 1. Applies buffered touches: younger and demoted items are promoted to
  ///    the head of the protected lane, protected items are refreshed there.
  /// 2. While the younger segment is over its target, its LRU item is either
  ///    demoted into the older segment or, if the older segment is already
  ///    over its own target, evicted.
  /// 3. While the shard is over capacity, evicts from the older segment first
  ///    (demoted lane, then protected lane), then from the younger tail.
  pub(crate) fn trim(
    &mut self,
    limits: ShardLimits,
    touches: &TouchBuffer,
    removals: &mut Vec<Removal<K, V>>,
  ) {
    self.drain_touches(touches);

    let older_capacity = limits.older_capacity();
    while self.younger.weight() > limits.younger_capacity {
      let Some(index) = self.younger.tail() else {
        break;
      };
      if self.older_weight() > older_capacity {
        removals.push(self.remove(index, EvictionReason::Capacity, true));
      } else {
        self.relink(index, Lane::Demoted);
      }
    }

    while self.weight() > limits.capacity {
      let victim = self
        .demoted
        .tail()
        .or_else(|| self.protected.tail())
        .or_else(|| self.younger.tail());
      let Some(index) = victim else {
        break;
      };
      removals.push(self.remove(index, EvictionReason::Capacity, true));
    }

    self.purge_tracked();
  }

  /// Applies buffered touches without evicting anything.
  pub(crate) fn drain_touches(&mut self, touches: &TouchBuffer) {
    touches.drain(|index| match self.nodes.get(index).map(|node| node.lane) {
      Some(Lane::Protected) => self.protected.move_to_front(&mut self.nodes, index),
      Some(_) => self.relink(index, Lane::Protected),
      None => {}
    });
  }

  /// Drops every resolved item, leaving pending items in place.
  pub(crate) fn clear_resolved(&mut self, touches: &TouchBuffer) -> Vec<Removal<K, V>> {
    touches.discard();
    self
      .items
      .retain(|_, item| matches!(item, Item::Pending { .. }));
    self.younger.clear();
    self.protected.clear();
    self.demoted.clear();
    self.tracked.clear();
    self
      .nodes
      .drain()
      .map(|(_, node)| Removal {
        key: node.key,
        value: node.value,
        weight: node.weight,
        reason: EvictionReason::Cleared,
      })
      .collect()
  }

  pub(crate) fn values(&self) -> impl Iterator<Item = Arc<V>> + '_ {
    self.nodes.iter().map(|(_, node)| node.value.clone())
  }

  pub(crate) fn segment_of(&self, index: Index) -> SegmentKind {
    self.nodes[index].lane.into()
  }

  #[inline]
  pub(crate) fn weight(&self) -> u64 {
    self.younger.weight() + self.older_weight()
  }

  #[inline]
  pub(crate) fn younger_weight(&self) -> u64 {
    self.younger.weight()
  }

  #[inline]
  pub(crate) fn older_weight(&self) -> u64 {
    self.protected.weight() + self.demoted.weight()
  }

  /// Number of resolved items.
  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.younger.len() + self.protected.len() + self.demoted.len()
  }

  fn lane_mut(&mut self, lane: Lane) -> &mut Segment {
    match lane {
      Lane::Younger => &mut self.younger,
      Lane::Protected => &mut self.protected,
      Lane::Demoted => &mut self.demoted,
    }
  }

  fn unlink(&mut self, index: Index) {
    let lane = self.nodes[index].lane;
    match lane {
      Lane::Younger => self.younger.unlink(&mut self.nodes, index),
      Lane::Protected => self.protected.unlink(&mut self.nodes, index),
      Lane::Demoted => self.demoted.unlink(&mut self.nodes, index),
    }
  }

  /// Moves a linked node to the head of another lane.
  fn relink(&mut self, index: Index, lane: Lane) {
    self.unlink(index);
    self.nodes[index].lane = lane;
    match lane {
      Lane::Younger => self.younger.push_front(&mut self.nodes, index),
      Lane::Protected => self.protected.push_front(&mut self.nodes, index),
      Lane::Demoted => self.demoted.push_front(&mut self.nodes, index),
    }
  }

  fn track(&mut self, node: &Node<K, V>) {
    // The node's own reference is the only one we hold.
    if Arc::strong_count(&node.value) > 1 {
      self
        .tracked
        .insert(node.key.clone(), Arc::downgrade(&node.value));
    } else {
      self.tracked.remove(&node.key);
    }
  }

  fn purge_tracked(&mut self) {
    if self.tracked.len() > TRACKED_PURGE_FLOOR.max(self.nodes.len()) {
      self.tracked.retain(|_, value| value.strong_count() > 0);
    }
  }
}
