use std::fmt;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The cache was configured with a capacity of zero. A cache must be able
  /// to hold at least one entry.
  ZeroCapacity,
  /// Neither a populator nor a loader was configured, so misses could never
  /// be resolved.
  PopulatorRequired,
  /// An `async_populator` was provided, but a blocking `Cache` was requested.
  /// Use `build_async()` instead.
  AsyncPopulatorRequiresAsyncCache,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroCapacity => write!(f, "cache capacity must be at least one"),
      BuildError::PopulatorRequired => {
        write!(f, "a populator or a loader must be configured")
      }
      BuildError::AsyncPopulatorRequiresAsyncCache => write!(
        f,
        "an async populator can only drive an AsyncCache; use build_async()"
      ),
    }
  }
}

impl std::error::Error for BuildError {}

/// Errors returned by `try_get_value` and `try_get_values`.
///
/// `E` is the error type of the configured populator or loader.
#[derive(Debug, thiserror::Error)]
pub enum CacheError<E> {
  /// The populator failed for the batch this call issued. Every key this
  /// call had reserved was rolled back out of the cache.
  #[error("populator failed for a batch of {keys} key(s)")]
  Population {
    keys: usize,
    #[source]
    source: E,
  },

  /// The populator returned a different number of values than it was asked
  /// for. Handled exactly like a population failure.
  #[error("populator returned {actual} value(s) for {expected} key(s)")]
  Cardinality { expected: usize, actual: usize },

  /// This call waited on a key another call was populating, and that
  /// population was abandoned without producing a value.
  #[error("waited for a value but none was produced")]
  StaleWait,
}

impl<E> CacheError<E> {
  /// Returns `true` if this error came from waiting on another caller's
  /// failed population rather than from this caller's own batch.
  pub fn is_stale_wait(&self) -> bool {
    matches!(self, CacheError::StaleWait)
  }
}
