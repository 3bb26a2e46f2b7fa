use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flightcache::{Cache, CacheBuilder};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::convert::Infallible;

const CAPACITY: usize = 10_000;

fn build_cache() -> Cache<u64, u64, Infallible> {
  CacheBuilder::new()
    .capacity(CAPACITY)
    .populator(|keys: &[u64]| Ok(keys.to_vec()))
    .build()
    .unwrap()
}

fn shuffled_keys(range: std::ops::Range<u64>) -> Vec<u64> {
  let mut keys: Vec<u64> = range.collect();
  keys.shuffle(&mut Pcg64::seed_from_u64(0));
  keys
}

fn bench_get_hit(c: &mut Criterion) {
  let cache = build_cache();
  for i in 0..CAPACITY as u64 {
    cache.add(i, i);
  }
  let keys = shuffled_keys(0..CAPACITY as u64);

  let mut group = c.benchmark_group("sync");
  group.throughput(Throughput::Elements(keys.len() as u64));
  group.bench_function("get_hit", |b| {
    b.iter(|| {
      for key in &keys {
        black_box(cache.try_get_value(key).unwrap());
      }
    })
  });
  group.finish();
}

fn bench_get_miss_batches(c: &mut Criterion) {
  let mut group = c.benchmark_group("sync_get_miss");
  for batch in [1usize, 16, 128] {
    let keys = shuffled_keys(0..(CAPACITY as u64 * 4));
    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
      let cache = build_cache();
      b.iter(|| {
        for chunk in keys.chunks(batch) {
          black_box(cache.try_get_values(chunk).unwrap());
        }
      })
    });
  }
  group.finish();
}

fn bench_add(c: &mut Criterion) {
  let cache = build_cache();
  let keys = shuffled_keys(0..(CAPACITY as u64 * 2));

  let mut group = c.benchmark_group("sync");
  group.throughput(Throughput::Elements(keys.len() as u64));
  group.bench_function("add", |b| {
    b.iter(|| {
      for &key in &keys {
        cache.add(key, key);
      }
    })
  });
  group.finish();
}

criterion_group!(benches, bench_get_hit, bench_get_miss_batches, bench_add);
criterion_main!(benches);
