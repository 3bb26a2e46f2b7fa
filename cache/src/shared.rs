use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::list::RecencyList;
use crate::sync::HybridMutex;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use tracing::{debug, trace, warn};

/// The internal, thread-safe core shared by `Cache` and `AsyncCache`.
///
/// All index and recency bookkeeping sits behind the single `list` lock.
/// That lock is only ever held for in-memory work: never across a populator
/// call and never while waiting on another caller's entry.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) name: String,
  pub(crate) capacity: usize,
  pub(crate) list: HybridMutex<RecencyList<K, V, H>>,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("name", &self.name)
      .field("capacity", &self.capacity)
      .finish_non_exhaustive()
  }
}

/// Where the value for one requested position will come from.
pub(crate) enum Resolution<V> {
  /// The entry already held a value.
  Ready(Arc<V>),
  /// The entry is reserved, either by this call or by a concurrent one.
  Waiting(Arc<CacheEntry<V>>),
}

impl<V> Resolution<V> {
  pub(crate) fn wait_blocking(self) -> Option<Arc<V>> {
    match self {
      Resolution::Ready(value) => Some(value),
      Resolution::Waiting(entry) => entry.wait_blocking(),
    }
  }

  pub(crate) async fn wait(self) -> Option<Arc<V>> {
    match self {
      Resolution::Ready(value) => Some(value),
      Resolution::Waiting(entry) => entry.wait().await,
    }
  }
}

/// The outcome of classifying a batch of keys under the global lock.
pub(crate) struct Lookup<'a, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// One resolution per requested key, in request order.
  pub(crate) resolutions: Vec<Resolution<V>>,
  /// The keys this call reserved and is now obliged to populate.
  pub(crate) reservations: Option<Reservations<'a, K, V, H>>,
}

/// Ownership of the reservations created by one lookup.
///
/// Settled exactly once: fulfilled with the populator's values, or rolled
/// back. Dropping it unsettled (the owning future was dropped, or the
/// populator panicked) rolls back too, so waiters are never left hanging.
pub(crate) struct Reservations<'a, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  shared: &'a CacheShared<K, V, H>,
  reserved: Vec<(K, Arc<CacheEntry<V>>)>,
  settled: bool,
}

impl<K, V, H> Reservations<'_, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// The reserved keys in request order, as handed to the populator.
  pub(crate) fn keys(&self) -> Vec<K> {
    self.reserved.iter().map(|(key, _)| key.clone()).collect()
  }

  /// Settles the batch with the populator's result.
  ///
  /// On success every reserved entry is fulfilled in order. On failure, or
  /// if the populator returned the wrong number of values, the whole batch
  /// is rolled back and the error is returned to the issuing caller only.
  pub(crate) fn complete<E>(mut self, outcome: Result<Vec<V>, E>) -> Result<(), CacheError<E>> {
    let expected = self.reserved.len();
    let values = match outcome {
      Ok(values) => values,
      Err(source) => {
        warn!(cache = %self.shared.name, keys = expected, "populator failed, rolling back reservations");
        self.roll_back();
        return Err(CacheError::Population {
          keys: expected,
          source,
        });
      }
    };

    if values.len() != expected {
      warn!(
        cache = %self.shared.name,
        expected,
        actual = values.len(),
        "populator returned the wrong number of values, rolling back reservations"
      );
      self.roll_back();
      return Err(CacheError::Cardinality {
        expected,
        actual: values.len(),
      });
    }

    for ((_, entry), value) in self.reserved.iter().zip(values) {
      entry.fulfill(Arc::new(value));
    }
    self.settled = true;
    Ok(())
  }

  fn roll_back(&mut self) {
    self.settled = true;
    {
      // Blocking acquisition: this also runs from `Drop`.
      let mut list = self.shared.list.lock();
      for (key, entry) in &self.reserved {
        list.remove_if_same(key, entry);
      }
    }
    for (_, entry) in &self.reserved {
      entry.abandon();
    }
  }
}

impl<K, V, H> Drop for Reservations<'_, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    debug!(
      cache = %self.shared.name,
      keys = self.reserved.len(),
      "reservations dropped before the populator finished, rolling back"
    );
    self.roll_back();
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn new(name: String, capacity: usize, hasher: H) -> Self {
    Self {
      name,
      capacity,
      list: HybridMutex::new(RecencyList::with_capacity_and_hasher(
        capacity.min(1024),
        hasher,
      )),
    }
  }

  // Makes room for one new key.
  fn make_room(&self, list: &mut RecencyList<K, V, H>) {
    let evicted = list.evict_to(self.capacity - 1);
    if evicted > 0 {
      trace!(cache = %self.name, evicted, "evicted least recently used entries");
    }
  }

  /// Classifies every key of a lookup, in order, under the global lock.
  ///
  /// Hits are bumped to the newest end. Hits on populated entries resolve
  /// immediately; hits on reserved entries resolve by waiting on them.
  /// Misses make room, then are reserved as empty entries owned by the
  /// returned `Reservations`. A key repeated within one lookup is reserved by
  /// its first occurrence and waited on by the rest.
  pub(crate) fn plan<'a>(&'a self, list: &mut RecencyList<K, V, H>, keys: &[K]) -> Lookup<'a, K, V, H> {
    let mut resolutions = Vec::with_capacity(keys.len());
    let mut reserved = Vec::new();

    for key in keys {
      if let Some(entry) = list.touch(key) {
        match entry.value() {
          Some(value) => {
            trace!(cache = %self.name, "recency hit");
            resolutions.push(Resolution::Ready(value));
          }
          None => resolutions.push(Resolution::Waiting(entry)),
        }
        continue;
      }

      self.make_room(list);
      let entry = Arc::new(CacheEntry::reserved());
      list.insert(key.clone(), entry.clone());
      reserved.push((key.clone(), entry.clone()));
      resolutions.push(Resolution::Waiting(entry));
    }

    let reservations = if reserved.is_empty() {
      None
    } else {
      Some(Reservations {
        shared: self,
        reserved,
        settled: false,
      })
    };

    Lookup {
      resolutions,
      reservations,
    }
  }

  /// Returns the value for `key` if it is cached and populated, bumping its
  /// recency.
  pub(crate) fn touch_value(&self, list: &mut RecencyList<K, V, H>, key: &K) -> Option<Arc<V>> {
    let value = list.touch(key)?.value();
    if value.is_some() {
      trace!(cache = %self.name, "recency hit");
    }
    value
  }

  /// Inserts an already-known value as the newest entry, evicting first if
  /// the key is new and the cache is full.
  pub(crate) fn insert_value(&self, list: &mut RecencyList<K, V, H>, key: K, value: Arc<V>) {
    if !list.contains_key(&key) {
      self.make_room(list);
    }
    list.insert(key, Arc::new(CacheEntry::populated(value)));
  }

  pub(crate) fn keys(&self) -> Vec<K> {
    self.list.lock().iter().map(|(key, _)| key.clone()).collect()
  }

  pub(crate) fn values(&self) -> Vec<Arc<V>> {
    self
      .list
      .lock()
      .iter()
      .filter_map(|(_, entry)| entry.value())
      .collect()
  }
}

/// Waits on every resolution in order, blocking the current thread.
pub(crate) fn resolve_blocking<V, E>(
  name: &str,
  resolutions: Vec<Resolution<V>>,
) -> Result<Vec<Arc<V>>, CacheError<E>> {
  resolutions
    .into_iter()
    .map(|resolution| {
      resolution.wait_blocking().ok_or_else(|| {
        debug!(cache = %name, "waited on a population that produced no value");
        CacheError::StaleWait
      })
    })
    .collect()
}

/// Waits on every resolution in order without blocking the thread.
pub(crate) async fn resolve<V, E>(
  name: &str,
  resolutions: Vec<Resolution<V>>,
) -> Result<Vec<Arc<V>>, CacheError<E>> {
  let mut values = Vec::with_capacity(resolutions.len());
  for resolution in resolutions {
    match resolution.wait().await {
      Some(value) => values.push(value),
      None => {
        debug!(cache = %name, "waited on a population that produced no value");
        return Err(CacheError::StaleWait);
      }
    }
  }
  Ok(values)
}
