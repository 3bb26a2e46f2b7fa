#![allow(dead_code)]

use flightcache::{AsyncCache, Cache, CacheBuilder};
use parking_lot::Mutex;
use std::sync::Arc;

/// The error our test populators fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend unavailable")]
pub struct BackendDown;

/// Records every batch handed to a populator, in call order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Vec<u32>>>>);

impl CallLog {
  pub fn record(&self, keys: &[u32]) {
    self.0.lock().push(keys.to_vec());
  }

  pub fn calls(&self) -> Vec<Vec<u32>> {
    self.0.lock().clone()
  }

  pub fn count(&self) -> usize {
    self.0.lock().len()
  }
}

/// A blocking cache whose populator maps every key `k` to `k * 10`.
pub fn times_ten_cache(capacity: usize) -> (Cache<u32, u32, BackendDown>, CallLog) {
  let log = CallLog::default();
  let cache = CacheBuilder::new()
    .capacity(capacity)
    .populator({
      let log = log.clone();
      move |keys: &[u32]| {
        log.record(keys);
        Ok(keys.iter().map(|k| k * 10).collect())
      }
    })
    .build()
    .unwrap();
  (cache, log)
}

/// The async counterpart of `times_ten_cache`.
pub fn times_ten_async_cache(capacity: usize) -> (AsyncCache<u32, u32, BackendDown>, CallLog) {
  let log = CallLog::default();
  let cache = CacheBuilder::new()
    .capacity(capacity)
    .async_populator({
      let log = log.clone();
      move |keys: Vec<u32>| {
        let log = log.clone();
        async move {
          log.record(&keys);
          Ok(keys.iter().map(|k| k * 10).collect())
        }
      }
    })
    .build_async()
    .unwrap();
  (cache, log)
}

pub fn values(values: Vec<Arc<u32>>) -> Vec<u32> {
  values.into_iter().map(|v| *v).collect()
}
