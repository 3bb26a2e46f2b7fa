//! A fixed-capacity, concurrent LRU cache that populates missing keys in
//! deduplicated batches.
//!
//! # Features
//! - **Strict LRU**: Every hit or insert makes a key the most recently used;
//!   inserting into a full cache evicts the least recently used key first.
//! - **Batched population**: `try_get_values` resolves all of its misses
//!   with a single call to the configured populator and returns values in
//!   request order.
//! - **Single flight**: Concurrent lookups of a key that is already being
//!   populated wait for that population instead of starting another one.
//! - **Sync & Async**: Provides both a blocking `Cache` and a non-blocking
//!   `AsyncCache` over the same core.
//! - **Non-Clone Support**: Stores values in an `Arc<V>`, avoiding `V: Clone` bounds.
//!
//! # Example
//! ```
//! use flightcache::CacheBuilder;
//!
//! let cache = CacheBuilder::new()
//!   .capacity(2)
//!   .populator(|keys: &[u32]| Ok::<_, std::io::Error>(keys.iter().map(|k| k * 10).collect()))
//!   .build()
//!   .unwrap();
//!
//! let values = cache.try_get_values(&[3, 1]).unwrap();
//! assert_eq!((*values[0], *values[1]), (30, 10));
//! assert!(cache.contains_key(&3));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;

// Internal, crate-only modules
mod entry;
mod list;
mod populator;
mod shared;
mod sync;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use error::{BuildError, CacheError};
pub use handles::{AsyncCache, Cache};
