use crate::error::CacheError;
use crate::populator::{BlockingPopulator, LoadFn};
use crate::shared::{self, CacheShared, Lookup};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use tracing::{debug, warn};

/// A thread-safe, synchronous LRU cache.
///
/// Lookups that miss are populated through the configured populator, and
/// waits on keys another thread is populating park the current thread.
/// Cloning the handle is cheap; clones share the same cache.
pub struct Cache<K, V, E, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
  pub(crate) populator: Arc<BlockingPopulator<K, V, E>>,
}

impl<K, V, E, H> Clone for Cache<K, V, E, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      populator: self.populator.clone(),
    }
  }
}

impl<K, V, E, H> fmt::Debug for Cache<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache")
      .field("shared", &self.shared)
      .field("populator", &self.populator)
      .finish()
  }
}

impl<K, V, E, H> Cache<K, V, E, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// The maximum number of entries the cache holds.
  pub fn capacity(&self) -> usize {
    self.shared.capacity
  }

  /// The number of entries currently cached, including keys whose
  /// population is still in flight.
  pub fn len(&self) -> usize {
    self.shared.list.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the key is cached or being populated.
  ///
  /// This does not count as a use: the key's recency is unchanged.
  pub fn contains_key<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.shared.list.lock().contains_key(key)
  }

  /// A snapshot of the cached keys, least recently used first.
  pub fn keys(&self) -> Vec<K> {
    self.shared.keys()
  }

  /// A snapshot of the cached values, least recently used first. Keys whose
  /// population is still in flight are skipped.
  pub fn values(&self) -> Vec<Arc<V>> {
    self.shared.values()
  }

  /// Inserts a value as the most recently used entry, evicting the least
  /// recently used entry first if the cache is full.
  ///
  /// An existing entry for the key is replaced.
  pub fn add(&self, key: K, value: V) {
    let mut list = self.shared.list.lock();
    self.shared.insert_value(&mut list, key, Arc::new(value));
  }

  /// Removes an entry from the cache, returning `true` if the key was found.
  pub fn remove<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.shared.list.lock().remove(key).is_some()
  }

  /// Removes all entries from the cache.
  ///
  /// Populations already in flight still complete for their callers, but
  /// their results are not cached.
  pub fn clear(&self) {
    self.shared.list.lock().clear();
  }

  /// Returns the value for `key`, populating it if it is missing.
  pub fn try_get_value(&self, key: &K) -> Result<Arc<V>, CacheError<E>> {
    let mut values = self.try_get_values(std::slice::from_ref(key))?;
    values.pop().ok_or(CacheError::Cardinality {
      expected: 1,
      actual: 0,
    })
  }

  /// Returns the values for `keys` in the same order, populating every
  /// missing key with a single populator call.
  ///
  /// Keys that another caller is already populating are waited on rather
  /// than fetched again. If this call's populator batch fails, every key it
  /// reserved is removed again and the error is returned; nothing is
  /// retried.
  pub fn try_get_values(&self, keys: &[K]) -> Result<Vec<Arc<V>>, CacheError<E>> {
    match &*self.populator {
      BlockingPopulator::Batch(populate) => {
        let Lookup {
          resolutions,
          reservations,
        } = {
          let mut list = self.shared.list.lock();
          self.shared.plan(&mut list, keys)
        };

        if let Some(reservations) = reservations {
          let missing = reservations.keys();
          debug!(cache = %self.shared.name, keys = missing.len(), "populating missing keys");
          let outcome = populate(&missing);
          reservations.complete(outcome)?;
        }

        shared::resolve_blocking(&self.shared.name, resolutions)
      }
      BlockingPopulator::PerKey(load) => keys.iter().map(|key| self.load(load, key)).collect(),
    }
  }

  // Per-key mode: no reservation, so concurrent misses may both load.
  fn load(&self, load: &LoadFn<K, V, E>, key: &K) -> Result<Arc<V>, CacheError<E>> {
    let cached = {
      let mut list = self.shared.list.lock();
      self.shared.touch_value(&mut list, key)
    };
    if let Some(value) = cached {
      return Ok(value);
    }

    debug!(cache = %self.shared.name, "loading missing key");
    let value = match load(key) {
      Ok(value) => Arc::new(value),
      Err(source) => {
        warn!(cache = %self.shared.name, "loader failed");
        return Err(CacheError::Population { keys: 1, source });
      }
    };

    let mut list = self.shared.list.lock();
    self.shared.insert_value(&mut list, key.clone(), value.clone());
    Ok(value)
  }

  /// Checks the index and recency list for structural consistency.
  #[doc(hidden)]
  pub fn check_invariants(&self) -> Result<(), String> {
    let list = self.shared.list.lock();
    if list.len() > self.shared.capacity {
      return Err(format!(
        "{} entries exceed capacity {}",
        list.len(),
        self.shared.capacity
      ));
    }
    list.validate()
  }
}
