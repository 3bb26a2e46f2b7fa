use crate::error::BuildError;
use crate::handles::{AsyncCache, Cache};
use crate::populator::Populator;
use crate::shared::CacheShared;

use core::fmt;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

const DEFAULT_NAME: &str = "cache";

/// A builder for creating `Cache` and `AsyncCache` instances.
///
/// A capacity of at least one and exactly one way of resolving misses (a
/// populator, an async populator, or a loader) must be configured.
pub struct CacheBuilder<K, V, E, H = ahash::RandomState> {
  capacity: usize,
  hasher: H,
  name: Option<String>,
  populator: Option<Populator<K, V, E>>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, E, H> fmt::Debug for CacheBuilder<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("capacity", &self.capacity)
      .field("name", &self.name)
      .field("populator", &self.populator)
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
// This impl block has no restrictive bounds on K, V or E.
impl<K, V, E, H> CacheBuilder<K, V, E, H> {
  /// Sets the maximum number of entries the cache holds.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Lets the cache grow without evicting.
  pub fn unbounded(mut self) -> Self {
    self.capacity = usize::MAX;
    self
  }

  /// Sets the name attached to the cache's log events.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets a blocking batch populator.
  ///
  /// The closure receives every key a lookup found missing, in lookup order,
  /// and must return one value per key in the same order. It is never called
  /// concurrently for overlapping keys, but may be called concurrently for
  /// disjoint batches.
  pub fn populator<F>(mut self, f: F) -> Self
  where
    F: Fn(&[K]) -> Result<Vec<V>, E> + Send + Sync + 'static,
  {
    self.populator = Some(Populator::Batch(Arc::new(f)));
    self
  }

  /// Sets an asynchronous batch populator. Only usable with `build_async()`.
  pub fn async_populator<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<V>, E>> + Send + 'static,
  {
    let populate_fn = move |keys| {
      Box::pin(f(keys)) as Pin<Box<dyn Future<Output = Result<Vec<V>, E>> + Send>>
    };
    self.populator = Some(Populator::AsyncBatch(Arc::new(populate_fn)));
    self
  }

  /// Sets a per-key loader instead of a batch populator.
  ///
  /// This is a lower-guarantee mode: misses are loaded one key at a time and
  /// are not deduplicated, so concurrent misses for the same key may each
  /// call the loader. Recency and eviction behave as usual.
  pub fn loader<F>(mut self, f: F) -> Self
  where
    F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
  {
    self.populator = Some(Populator::PerKey(Arc::new(f)));
    self
  }
}

// --- Default Constructor ---
impl<K, V, E> CacheBuilder<K, V, E, ahash::RandomState> {
  /// Creates a new, unbounded `CacheBuilder` using the default hasher.
  pub fn new() -> Self {
    Self::with_hasher(ahash::RandomState::new())
  }
}

impl<K, V, E> Default for CacheBuilder<K, V, E, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, E, H> CacheBuilder<K, V, E, H> {
  /// Creates a new, unbounded `CacheBuilder` whose key index uses `hasher`.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      capacity: usize::MAX,
      hasher,
      name: None,
      populator: None,
    }
  }
}

// --- Build Methods ---
impl<K, V, E, H> CacheBuilder<K, V, E, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Builds a synchronous `Cache`.
  pub fn build(self) -> Result<Cache<K, V, E, H>, BuildError> {
    let (shared, populator) = self.into_parts()?;
    let populator = populator
      .into_blocking()
      .ok_or(BuildError::AsyncPopulatorRequiresAsyncCache)?;
    Ok(Cache {
      shared,
      populator: Arc::new(populator),
    })
  }

  /// Builds an asynchronous `AsyncCache`.
  pub fn build_async(self) -> Result<AsyncCache<K, V, E, H>, BuildError> {
    let (shared, populator) = self.into_parts()?;
    Ok(AsyncCache {
      shared,
      populator: Arc::new(populator),
    })
  }

  fn into_parts(self) -> Result<(Arc<CacheShared<K, V, H>>, Populator<K, V, E>), BuildError> {
    self.validate()?;
    let populator = self.populator.ok_or(BuildError::PopulatorRequired)?;
    let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());

    debug!(cache = %name, capacity = self.capacity, mode = ?populator, "built cache");
    let shared = CacheShared::new(name, self.capacity, self.hasher);
    Ok((Arc::new(shared), populator))
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if self.populator.is_none() {
      return Err(BuildError::PopulatorRequired);
    }
    Ok(())
  }
}
