use flightcache::CacheBuilder;
use std::convert::Infallible;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tokio::time::{sleep, Duration};

// A simulated database that answers batched queries slowly.
async fn fetch_from_database(keys: Vec<i32>, calls: Arc<AtomicUsize>) -> Vec<String> {
  println!("--- Database: Received batch {:?}. Simulating slow query...", keys);
  calls.fetch_add(1, Ordering::SeqCst);
  sleep(Duration::from_millis(500)).await;
  keys.iter().map(|key| format!("value_for_{}", key)).collect()
}

#[tokio::main]
async fn main() {
  let call_counter = Arc::new(AtomicUsize::new(0));

  let cache = CacheBuilder::default()
    .capacity(10)
    .async_populator({
      let counter = call_counter.clone();
      move |keys: Vec<i32>| {
        let counter = counter.clone();
        async move { Ok::<_, Infallible>(fetch_from_database(keys, counter).await) }
      }
    })
    .build_async()
    .expect("Failed to build async cache");

  println!("--- Thundering Herd Demonstration ---");
  println!("Spawning 10 tasks to request keys [41, 42] at once.\n");

  let mut tasks = Vec::new();
  for i in 0..10 {
    let cache = cache.clone();
    tasks.push(tokio::spawn(async move {
      let values = cache.try_get_values(&[41, 42]).await.expect("lookup failed");
      println!("[Task {}] Received {:?}", i, values);
      assert_eq!(*values[1], "value_for_42");
    }));
  }

  for task in tasks {
    task.await.unwrap();
  }

  println!(
    "\nDatabase was called {} time(s).",
    call_counter.load(Ordering::SeqCst)
  );
  assert_eq!(call_counter.load(Ordering::SeqCst), 1);

  println!("Requesting key 42 again. This should now be a cache hit.");
  let value = cache.try_get_value(&42).await.expect("lookup failed");
  println!("Received value: {}", value);
  assert_eq!(call_counter.load(Ordering::SeqCst), 1);
}
