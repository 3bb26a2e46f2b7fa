use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

/// Represents a caller blocked on an entry that is still being populated.
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// The lifecycle of an entry's value.
///
/// `Reserved` is the only non-terminal state. Exactly one transition out of
/// it ever happens, performed by whoever owns the reservation.
enum State<V> {
  Reserved,
  Populated(Arc<V>),
  Abandoned,
}

struct Inner<V> {
  state: State<V>,
  waiters: VecDeque<Waiter>,
}

/// The value half of a cache entry, shared between the recency list and any
/// in-flight lookups that resolved to it.
///
/// Besides holding the value, an entry doubles as a one-shot completion
/// signal: lookups that find it `Reserved` block (or yield) until the owner
/// either fulfills or abandons it. Waiters hold their own `Arc`, so they
/// still complete after the entry has been evicted from the cache.
pub(crate) struct CacheEntry<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> CacheEntry<V> {
  /// Creates an empty entry, claimed by the caller that will populate it.
  pub(crate) fn reserved() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Reserved,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Creates an entry whose value is already known.
  pub(crate) fn populated(value: Arc<V>) -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Populated(value),
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Returns the value if the entry has been populated.
  #[inline]
  pub(crate) fn value(&self) -> Option<Arc<V>> {
    match &self.inner.lock().state {
      State::Populated(value) => Some(value.clone()),
      _ => None,
    }
  }

  #[inline]
  pub(crate) fn has_value(&self) -> bool {
    matches!(self.inner.lock().state, State::Populated(_))
  }

  /// Publishes the value and wakes every waiter.
  ///
  /// Only the reservation owner calls this, and only once.
  pub(crate) fn fulfill(&self, value: Arc<V>) {
    self.settle(State::Populated(value));
  }

  /// Releases the reservation without a value. Waiters wake up and observe
  /// that nothing was produced.
  pub(crate) fn abandon(&self) {
    self.settle(State::Abandoned);
  }

  fn settle(&self, next: State<V>) {
    let waiters = {
      let mut inner = self.inner.lock();
      if !matches!(inner.state, State::Reserved) {
        return;
      }
      inner.state = next;
      std::mem::take(&mut inner.waiters)
    };
    for waiter in waiters {
      waiter.wake();
    }
  }

  /// Blocks the current thread until the entry leaves the `Reserved` state.
  ///
  /// Returns `None` if the reservation was abandoned.
  pub(crate) fn wait_blocking(&self) -> Option<Arc<V>> {
    loop {
      {
        let mut inner = self.inner.lock();
        match &inner.state {
          State::Populated(value) => return Some(value.clone()),
          State::Abandoned => return None,
          State::Reserved => inner.waiters.push_back(Waiter::Sync(thread::current())),
        }
      }
      // Unparks can be spurious or stale; the state is re-checked each round.
      thread::park();
    }
  }

  /// Returns a future that resolves once the entry leaves the `Reserved`
  /// state, yielding `None` if the reservation was abandoned.
  pub(crate) fn wait(&self) -> Wait<'_, V> {
    Wait { entry: self }
  }
}

impl<V> fmt::Debug for CacheEntry<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("has_value", &self.has_value())
      .finish()
  }
}

/// The `Future` returned by `CacheEntry::wait()`.
#[must_use = "futures do nothing unless you .await or poll them"]
pub(crate) struct Wait<'a, V> {
  entry: &'a CacheEntry<V>,
}

impl<V> Future for Wait<'_, V> {
  type Output = Option<Arc<V>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.entry.inner.lock();
    match &inner.state {
      State::Populated(value) => Poll::Ready(Some(value.clone())),
      State::Abandoned => Poll::Ready(None),
      State::Reserved => {
        let already_queued = inner.waiters.iter().any(|w| match w {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        });
        if !already_queued {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::time::Duration;

  #[test]
  fn populated_entry_resolves_immediately() {
    let entry = CacheEntry::populated(Arc::new(7));
    assert!(entry.has_value());
    assert_eq!(entry.value().as_deref(), Some(&7));
    assert_eq!(entry.wait_blocking().as_deref(), Some(&7));
    assert_eq!(
      futures_executor::block_on(entry.wait()).as_deref(),
      Some(&7)
    );
  }

  #[test]
  fn reserved_entry_has_no_value() {
    let entry = CacheEntry::<i32>::reserved();
    assert!(!entry.has_value());
    assert!(entry.value().is_none());
  }

  #[test]
  fn fulfill_wakes_blocked_threads() {
    let entry = Arc::new(CacheEntry::reserved());
    let handles: Vec<_> = (0..4)
      .map(|_| {
        let entry = entry.clone();
        thread::spawn(move || entry.wait_blocking())
      })
      .collect();

    thread::sleep(Duration::from_millis(50));
    entry.fulfill(Arc::new("done"));

    for handle in handles {
      assert_eq!(handle.join().unwrap().as_deref(), Some(&"done"));
    }
  }

  #[test]
  fn abandon_wakes_waiters_without_value() {
    let entry = Arc::new(CacheEntry::<u8>::reserved());
    let waiter = {
      let entry = entry.clone();
      thread::spawn(move || entry.wait_blocking())
    };

    thread::sleep(Duration::from_millis(50));
    entry.abandon();

    assert!(waiter.join().unwrap().is_none());
    assert!(!entry.has_value());
  }

  #[test]
  fn only_the_first_transition_counts() {
    let entry = CacheEntry::reserved();
    entry.fulfill(Arc::new(1));
    entry.abandon();
    entry.fulfill(Arc::new(2));
    assert_eq!(entry.value().as_deref(), Some(&1));
  }

  #[tokio::test]
  async fn async_waiters_complete_on_fulfill() {
    let entry = Arc::new(CacheEntry::reserved());
    let tasks: Vec<_> = (0..4)
      .map(|_| {
        let entry = entry.clone();
        tokio::spawn(async move { entry.wait().await })
      })
      .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    entry.fulfill(Arc::new(99u32));

    for task in tasks {
      assert_eq!(task.await.unwrap().as_deref(), Some(&99));
    }
  }
}
