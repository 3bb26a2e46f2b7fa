use crate::entry::CacheEntry;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use generational_arena::{Arena, Index};

struct Node<K, V> {
  key: K,
  entry: Arc<CacheEntry<V>>,
  older: Option<Index>,
  newer: Option<Index>,
}

/// The key index and recency order of the cache.
///
/// Nodes live in a generational arena and link to each other by arena index,
/// so the map holds `key -> index` and the list holds `older`/`newer`
/// indices instead of aliased references. `oldest` is the eviction end,
/// `newest` the most-recently-used end.
///
/// Nothing here synchronizes; the owner keeps the whole list behind the
/// cache's global lock.
pub(crate) struct RecencyList<K, V, H> {
  nodes: Arena<Node<K, V>>,
  index: HashMap<K, Index, H>,
  oldest: Option<Index>,
  newest: Option<Index>,
}

impl<K, V, H> fmt::Debug for RecencyList<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecencyList")
      .field("len", &self.index.len())
      .field("oldest", &self.oldest)
      .field("newest", &self.newest)
      .finish()
  }
}

impl<K, V, H> RecencyList<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
    Self {
      nodes: Arena::with_capacity(capacity),
      index: HashMap::with_capacity_and_hasher(capacity, hasher),
      oldest: None,
      newest: None,
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.index.len()
  }

  /// Membership test. Does not affect recency.
  pub fn contains_key<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.index.contains_key(key)
  }

  // Splices a node out of the chain. Arena and map are left untouched.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let older = node.older;
    let newer = node.newer;

    if let Some(older_idx) = older {
      self.nodes[older_idx].newer = newer;
    } else {
      // We are unlinking the oldest node.
      self.oldest = newer;
    }

    if let Some(newer_idx) = newer {
      self.nodes[newer_idx].older = older;
    } else {
      // We are unlinking the newest node.
      self.newest = older;
    }

    let node = &mut self.nodes[index];
    node.older = None;
    node.newer = None;
  }

  // Links a node (already in the arena, not in the chain) after `newest`.
  fn link_at_newest(&mut self, index: Index) {
    let previous_newest = self.newest;
    self.nodes[index].older = previous_newest;
    self.nodes[index].newer = None;
    self.newest = Some(index);

    match previous_newest {
      Some(prev) => self.nodes[prev].newer = Some(index),
      None => self.oldest = Some(index),
    }
  }

  fn remove_node(&mut self, index: Index) -> Option<(K, Arc<CacheEntry<V>>)> {
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.index.remove(&node.key);
    Some((node.key, node.entry))
  }

  /// Looks up `key` and, if present, moves it to the most-recently-used end.
  pub fn touch<Q>(&mut self, key: &Q) -> Option<Arc<CacheEntry<V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let index = *self.index.get(key)?;
    if self.newest != Some(index) {
      self.unlink(index);
      self.link_at_newest(index);
    }
    Some(self.nodes[index].entry.clone())
  }

  /// Inserts `entry` as the newest node for `key`.
  ///
  /// An existing node for the same key is replaced and its entry returned.
  /// Capacity is the caller's concern; see `evict_to`.
  pub fn insert(&mut self, key: K, entry: Arc<CacheEntry<V>>) -> Option<Arc<CacheEntry<V>>> {
    let replaced = match self.index.get(&key) {
      Some(&existing) => self.remove_node(existing).map(|(_, entry)| entry),
      None => None,
    };

    let index = self.nodes.insert(Node {
      key: key.clone(),
      entry,
      older: None,
      newer: None,
    });
    self.index.insert(key, index);
    self.link_at_newest(index);

    replaced
  }

  /// Removes the least recently used node.
  pub fn evict_oldest(&mut self) -> Option<(K, Arc<CacheEntry<V>>)> {
    let oldest = self.oldest?;
    self.remove_node(oldest)
  }

  /// Evicts oldest nodes until at most `limit` remain. Returns how many were
  /// evicted.
  pub fn evict_to(&mut self, limit: usize) -> usize {
    let mut evicted = 0;
    while self.index.len() > limit {
      if self.evict_oldest().is_none() {
        break;
      }
      evicted += 1;
    }
    evicted
  }

  /// Removes `key`, returning its entry.
  pub fn remove<Q>(&mut self, key: &Q) -> Option<Arc<CacheEntry<V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let index = *self.index.get(key)?;
    self.remove_node(index).map(|(_, entry)| entry)
  }

  /// Removes `key` only if it still maps to exactly `entry`.
  ///
  /// Used to roll back a reservation without destroying a newer entry that
  /// has since taken over the same key.
  pub fn remove_if_same(&mut self, key: &K, entry: &Arc<CacheEntry<V>>) -> bool {
    match self.index.get(key) {
      Some(&index) if Arc::ptr_eq(&self.nodes[index].entry, entry) => {
        self.remove_node(index).is_some()
      }
      _ => false,
    }
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
    self.index.clear();
    self.oldest = None;
    self.newest = None;
  }

  /// Iterates from the oldest to the newest node.
  pub fn iter(&self) -> Iter<'_, K, V> {
    Iter {
      nodes: &self.nodes,
      next: self.oldest,
      remaining: self.index.len(),
    }
  }

  /// Checks the structural invariants: the forward walk from `oldest` and
  /// the backward walk from `newest` visit every indexed node exactly once,
  /// in mirrored order, and the ends are empty together.
  pub fn validate(&self) -> Result<(), String> {
    let len = self.index.len();
    if self.nodes.len() != len {
      return Err(format!("arena holds {} nodes but index holds {}", self.nodes.len(), len));
    }
    if self.oldest.is_none() != self.newest.is_none() || self.oldest.is_none() != (len == 0) {
      return Err(format!(
        "ends disagree: oldest={:?} newest={:?} len={}",
        self.oldest, self.newest, len
      ));
    }

    let mut forward = Vec::with_capacity(len);
    let mut current = self.oldest;
    while let Some(index) = current {
      if forward.len() > len {
        return Err("forward walk does not terminate".to_string());
      }
      let node = self.nodes.get(index).ok_or("dangling newer link")?;
      if self.index.get(&node.key) != Some(&index) {
        return Err("walked node is not the indexed node for its key".to_string());
      }
      forward.push(index);
      current = node.newer;
    }
    if forward.len() != len {
      return Err(format!("forward walk visited {} of {} nodes", forward.len(), len));
    }
    if forward.last().copied() != self.newest {
      return Err("forward walk does not end at newest".to_string());
    }

    let mut backward = Vec::with_capacity(len);
    let mut current = self.newest;
    while let Some(index) = current {
      if backward.len() > len {
        return Err("backward walk does not terminate".to_string());
      }
      let node = self.nodes.get(index).ok_or("dangling older link")?;
      backward.push(index);
      current = node.older;
    }
    backward.reverse();
    if backward != forward {
      return Err("backward walk is not the reverse of the forward walk".to_string());
    }

    Ok(())
  }
}

/// Oldest-to-newest iterator over the list.
pub(crate) struct Iter<'a, K, V> {
  nodes: &'a Arena<Node<K, V>>,
  next: Option<Index>,
  remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
  type Item = (&'a K, &'a Arc<CacheEntry<V>>);

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.nodes.get(self.next?)?;
    self.next = node.newer;
    self.remaining = self.remaining.saturating_sub(1);
    Some((&node.key, &node.entry))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.remaining))
  }
}
