mod common;

use common::{times_ten_cache, values, BackendDown};
use flightcache::{BuildError, Cache, CacheBuilder};

#[test]
fn test_build_rejects_zero_capacity() {
  let result = CacheBuilder::<u32, u32, BackendDown>::new()
    .capacity(0)
    .populator(|keys: &[u32]| Ok(keys.to_vec()))
    .build();
  assert_eq!(result.unwrap_err(), BuildError::ZeroCapacity);
}

#[test]
fn test_build_requires_a_populator() {
  let result = CacheBuilder::<u32, u32, BackendDown>::new().capacity(4).build();
  assert_eq!(result.unwrap_err(), BuildError::PopulatorRequired);
}

#[test]
fn test_blocking_build_rejects_async_populator() {
  let result = CacheBuilder::<u32, u32, BackendDown>::new()
    .capacity(4)
    .async_populator(|keys: Vec<u32>| async move { Ok(keys) })
    .build();
  assert_eq!(
    result.unwrap_err(),
    BuildError::AsyncPopulatorRequiresAsyncCache
  );
}

#[test]
fn test_add_then_get_skips_populator() {
  let (cache, log) = times_ten_cache(4);
  cache.add(7, 700);

  let value = cache.try_get_value(&7).unwrap();
  assert_eq!(*value, 700, "Added value should be returned as-is");
  assert_eq!(log.count(), 0, "Populator should not be called for a cached key");
  assert_eq!(cache.len(), 1);
}

#[test]
fn test_add_replaces_existing_value() {
  let (cache, _) = times_ten_cache(2);
  cache.add(1, 1);
  cache.add(2, 2);
  cache.add(1, 100);

  assert_eq!(cache.len(), 2, "Replacing must not grow the cache");
  assert_eq!(cache.keys(), vec![2, 1], "Replaced key becomes the newest");
  assert_eq!(*cache.try_get_value(&1).unwrap(), 100);
  cache.check_invariants().unwrap();
}

#[test]
fn test_add_evicts_least_recently_used() {
  let (cache, _) = times_ten_cache(2);
  cache.add(1, 10);
  cache.add(2, 20);
  cache.add(3, 30);

  assert!(!cache.contains_key(&1), "Oldest key should be evicted");
  assert!(cache.contains_key(&2));
  assert!(cache.contains_key(&3));
  assert_eq!(cache.len(), 2);
}

#[test]
fn test_lru_touch_order_evicts_untouched_key() {
  let (cache, log) = times_ten_cache(2);

  // Touch order A, B, A, C: B is the least recently used when C arrives.
  cache.add(1, 10);
  cache.try_get_value(&2).unwrap();
  cache.try_get_value(&1).unwrap();
  cache.add(3, 30);

  assert!(cache.contains_key(&1), "A was touched and must survive");
  assert!(!cache.contains_key(&2), "B must be evicted");
  assert!(cache.contains_key(&3));
  assert_eq!(log.calls(), vec![vec![2]]);
}

#[test]
fn test_contains_key_does_not_affect_recency() {
  let (cache, _) = times_ten_cache(2);
  cache.add(1, 10);
  cache.add(2, 20);

  // Only a lookup would rescue key 1; a membership test must not.
  assert!(cache.contains_key(&1));
  cache.add(3, 30);

  assert!(!cache.contains_key(&1));
  assert!(cache.contains_key(&2));
}

#[test]
fn test_remove() {
  let (cache, _) = times_ten_cache(4);
  cache.add(1, 10);
  cache.add(2, 20);
  cache.add(3, 30);

  assert!(cache.remove(&1), "Removing the oldest key should succeed");
  assert!(cache.remove(&3), "Removing the newest key should succeed");
  assert!(!cache.remove(&1), "Removing twice should report a miss");
  assert!(!cache.remove(&99));

  assert_eq!(cache.keys(), vec![2]);
  cache.check_invariants().unwrap();

  assert!(cache.remove(&2));
  assert!(cache.is_empty());
  cache.check_invariants().unwrap();
}

#[test]
fn test_removed_key_is_populated_again() {
  let (cache, log) = times_ten_cache(4);
  cache.try_get_value(&5).unwrap();
  assert!(cache.remove(&5));

  assert_eq!(*cache.try_get_value(&5).unwrap(), 50);
  assert_eq!(log.calls(), vec![vec![5], vec![5]]);
}

#[test]
fn test_clear() {
  let (cache, log) = times_ten_cache(4);
  cache.add(1, 10);
  cache.try_get_values(&[2, 3]).unwrap();
  assert_eq!(cache.len(), 3);

  cache.clear();

  assert!(cache.is_empty());
  assert!(cache.keys().is_empty());
  assert!(cache.values().is_empty());
  cache.check_invariants().unwrap();

  assert_eq!(*cache.try_get_value(&1).unwrap(), 10);
  assert_eq!(log.calls(), vec![vec![2, 3], vec![1]]);
}

#[test]
fn test_keys_and_values_snapshot_in_recency_order() {
  let (cache, _) = times_ten_cache(4);
  cache.add(1, 10);
  cache.add(2, 20);
  cache.add(3, 30);
  cache.try_get_value(&1).unwrap();

  assert_eq!(cache.keys(), vec![2, 3, 1]);
  assert_eq!(values(cache.values()), vec![20, 30, 10]);
}

#[test]
fn test_concrete_scenario() {
  let (cache, log): (Cache<u32, u32, BackendDown>, _) = times_ten_cache(2);

  assert_eq!(*cache.try_get_value(&1).unwrap(), 10);
  assert_eq!(*cache.try_get_value(&2).unwrap(), 20);
  assert_eq!(*cache.try_get_value(&1).unwrap(), 10);
  assert_eq!(*cache.try_get_value(&3).unwrap(), 30);

  assert_eq!(log.calls(), vec![vec![1], vec![2], vec![3]]);
  assert!(cache.contains_key(&1));
  assert!(!cache.contains_key(&2));
  assert!(cache.contains_key(&3));
  cache.check_invariants().unwrap();
}

#[test]
fn test_batch_preserves_request_order() {
  let (cache, log) = times_ten_cache(3);

  let result = cache.try_get_values(&[3, 1, 2]).unwrap();
  assert_eq!(values(result), vec![30, 10, 20]);
  assert_eq!(log.calls(), vec![vec![3, 1, 2]], "One populator call for all misses");
}

#[test]
fn test_batch_mixes_hits_and_misses() {
  let (cache, log) = times_ten_cache(8);
  cache.add(2, 222);
  cache.try_get_value(&4).unwrap();

  let result = cache.try_get_values(&[1, 2, 3, 4]).unwrap();
  assert_eq!(values(result), vec![10, 222, 30, 40]);
  assert_eq!(
    log.calls(),
    vec![vec![4], vec![1, 3]],
    "Only the missing keys are requested, in request order"
  );
}

#[test]
fn test_batch_with_duplicate_keys_populates_once() {
  let (cache, log) = times_ten_cache(4);

  let result = cache.try_get_values(&[5, 6, 5, 5]).unwrap();
  assert_eq!(values(result), vec![50, 60, 50, 50]);
  assert_eq!(log.calls(), vec![vec![5, 6]]);
  assert_eq!(cache.len(), 2);
}

#[test]
fn test_empty_batch() {
  let (cache, log) = times_ten_cache(4);
  assert!(cache.try_get_values(&[]).unwrap().is_empty());
  assert_eq!(log.count(), 0);
}

#[test]
fn test_batch_larger_than_capacity_still_returns_every_value() {
  let (cache, log) = times_ten_cache(2);

  // Later reservations evict earlier ones from the index, but this call
  // still owns them and receives their values.
  let result = cache.try_get_values(&[1, 2, 3, 4]).unwrap();
  assert_eq!(values(result), vec![10, 20, 30, 40]);
  assert_eq!(log.calls(), vec![vec![1, 2, 3, 4]]);

  assert_eq!(cache.keys(), vec![3, 4]);
  cache.check_invariants().unwrap();
}

#[test]
fn test_unbounded_cache_never_evicts() {
  let cache = CacheBuilder::new()
    .unbounded()
    .populator(|keys: &[u32]| Ok::<_, BackendDown>(keys.to_vec()))
    .build()
    .unwrap();

  let keys: Vec<u32> = (0..2_000).collect();
  cache.try_get_values(&keys).unwrap();
  assert_eq!(cache.len(), 2_000);
  assert_eq!(cache.capacity(), usize::MAX);
}

#[test]
fn test_borrowed_key_lookups() {
  let cache = CacheBuilder::new()
    .capacity(4)
    .populator(|keys: &[String]| Ok::<_, BackendDown>(keys.iter().map(|k| k.len()).collect()))
    .build()
    .unwrap();

  assert_eq!(*cache.try_get_value(&"four".to_string()).unwrap(), 4);
  assert!(cache.contains_key("four"));
  assert!(cache.remove("four"));
  assert!(!cache.contains_key("four"));
}

#[test]
fn test_non_clone_values() {
  struct Connection {
    id: u32,
  }

  let cache = CacheBuilder::new()
    .capacity(2)
    .populator(|keys: &[u32]| {
      Ok::<_, BackendDown>(keys.iter().map(|&id| Connection { id }).collect())
    })
    .build()
    .unwrap();

  let first = cache.try_get_value(&9).unwrap();
  let second = cache.try_get_value(&9).unwrap();
  assert_eq!(first.id, 9);
  assert!(std::sync::Arc::ptr_eq(&first, &second));
}
