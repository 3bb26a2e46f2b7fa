use flightcache::CacheBuilder;
use std::convert::Infallible;

fn main() {
  // A three-entry cache that squares whatever keys it is asked for.
  let cache = CacheBuilder::default()
    .capacity(3)
    .name("squares")
    .populator(|keys: &[u32]| {
      println!("Populating {:?}", keys);
      Ok::<_, Infallible>(keys.iter().map(|k| k * k).collect())
    })
    .build()
    .expect("Failed to build cache");

  println!("Adding (1, 100) directly.");
  cache.add(1, 100);

  // 1 is a hit; 2 and 3 are fetched together in one populator call.
  let values = cache.try_get_values(&[1, 2, 3]).expect("lookup failed");
  println!("Values for [1, 2, 3]: {:?}", values);

  // 4 is new and the cache is full, so the least recently used key goes.
  let four = cache.try_get_value(&4).expect("lookup failed");
  println!("Value for 4: {}", four);
  println!("Keys, oldest first: {:?}", cache.keys());

  println!("Removing 3: {}", cache.remove(&3));
  println!("Contains 3: {}", cache.contains_key(&3));
  println!("Count: {}", cache.len());
}
