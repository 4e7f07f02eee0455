use crate::item::Node;

use generational_arena::{Arena, Index};

/// Which half of a shard's segmented LRU an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
  /// Probationary segment. New items land here.
  Younger,
  /// Protected segment. Items touched while younger are promoted here.
  Older,
}

impl From<Lane> for SegmentKind {
  fn from(lane: Lane) -> Self {
    match lane {
      Lane::Younger => SegmentKind::Younger,
      Lane::Protected | Lane::Demoted => SegmentKind::Older,
    }
  }
}

/// The list a node is linked into.
///
/// The older segment is kept as two lists: `Protected` holds promoted items in
/// LRU order, `Demoted` holds younger overflow in FIFO order. Demoted items are
/// always evicted before protected ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lane {
  Younger,
  Protected,
  Demoted,
}

// A weight-tracking doubly linked list threaded through the shard's node arena.
// Head is the most-recently-used item, tail the least-recently-used one.
#[derive(Debug, Default)]
pub(crate) struct Segment {
  head: Option<Index>,
  tail: Option<Index>,
  weight: u64,
  len: usize,
}

impl Segment {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn weight(&self) -> u64 {
    self.weight
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub(crate) fn tail(&self) -> Option<Index> {
    self.tail
  }

  pub(crate) fn push_front<K, V>(&mut self, nodes: &mut Arena<Node<K, V>>, index: Index) {
    let old_head = self.head;
    let node = &mut nodes[index];
    node.prev = None;
    node.next = old_head;
    self.weight += node.weight;
    self.len += 1;

    if let Some(old_head) = old_head {
      nodes[old_head].prev = Some(index);
    } else {
      self.tail = Some(index);
    }
    self.head = Some(index);
  }

  /// Unlinks a node. The node stays in the arena.
  pub(crate) fn unlink<K, V>(&mut self, nodes: &mut Arena<Node<K, V>>, index: Index) {
    let node = &mut nodes[index];
    let (prev, next, weight) = (node.prev.take(), node.next.take(), node.weight);

    match prev {
      Some(prev) => nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => nodes[next].prev = prev,
      None => self.tail = prev,
    }

    self.weight -= weight;
    self.len -= 1;
  }

  pub(crate) fn move_to_front<K, V>(&mut self, nodes: &mut Arena<Node<K, V>>, index: Index) {
    if self.head != Some(index) {
      self.unlink(nodes, index);
      self.push_front(nodes, index);
    }
  }

  /// Accounts for a linked node whose weight changed in place.
  pub(crate) fn reweigh(&mut self, old_weight: u64, new_weight: u64) {
    self.weight = self.weight - old_weight + new_weight;
  }

  pub(crate) fn clear(&mut self) {
    *self = Self::default();
  }

  // A helper for tests, to get the order of indices from head to tail.
  #[cfg(test)]
  pub(crate) fn indices<K, V>(&self, nodes: &Arena<Node<K, V>>) -> Vec<Index> {
    let mut order = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      order.push(index);
      current = nodes[index].next;
    }
    order
  }
}
