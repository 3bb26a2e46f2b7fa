use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub(crate) type BatchFn<K, V, E> = Arc<dyn Fn(&[K]) -> Result<Vec<V>, E> + Send + Sync>;
pub(crate) type AsyncBatchFn<K, V, E> =
  Arc<dyn Fn(Vec<K>) -> Pin<Box<dyn Future<Output = Result<Vec<V>, E>> + Send>> + Send + Sync>;
pub(crate) type LoadFn<K, V, E> = Arc<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

/// How missing keys are resolved.
///
/// The batch variants are given every key a lookup reserved, in lookup
/// order, and must return exactly one value per key in the same order.
/// `PerKey` is the lower-guarantee mode: keys are loaded one at a time with
/// no reservation, so concurrent misses for the same key may load twice.
pub(crate) enum Populator<K, V, E> {
  Batch(BatchFn<K, V, E>),
  AsyncBatch(AsyncBatchFn<K, V, E>),
  PerKey(LoadFn<K, V, E>),
}

impl<K, V, E> fmt::Debug for Populator<K, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self {
      Populator::Batch(_) => "Batch",
      Populator::AsyncBatch(_) => "AsyncBatch",
      Populator::PerKey(_) => "PerKey",
    };
    f.write_str(kind)
  }
}

impl<K, V, E> Populator<K, V, E> {
  /// Narrows to the variants a blocking handle can drive.
  pub(crate) fn into_blocking(self) -> Option<BlockingPopulator<K, V, E>> {
    match self {
      Populator::Batch(f) => Some(BlockingPopulator::Batch(f)),
      Populator::PerKey(f) => Some(BlockingPopulator::PerKey(f)),
      Populator::AsyncBatch(_) => None,
    }
  }
}

/// The subset of `Populator` usable without an async runtime.
pub(crate) enum BlockingPopulator<K, V, E> {
  Batch(BatchFn<K, V, E>),
  PerKey(LoadFn<K, V, E>),
}

impl<K, V, E> fmt::Debug for BlockingPopulator<K, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self {
      BlockingPopulator::Batch(_) => "Batch",
      BlockingPopulator::PerKey(_) => "PerKey",
    };
    f.write_str(kind)
  }
}
