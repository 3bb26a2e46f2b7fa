use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// A hybrid mutex that uses a fast, blocking `parking_lot::Mutex` internally
/// but also provides a non-thread-blocking `async` interface for acquiring
/// the lock under contention.
///
/// Critical sections guarded by this lock are short and never await, so the
/// blocking path is cheap and the async path only has to avoid parking the
/// executor thread while someone else holds it.
#[derive(Debug, Default)]
pub(crate) struct HybridMutex<T> {
  inner: Mutex<T>,
  waiters: Mutex<VecDeque<Waker>>,
}

impl<T> HybridMutex<T> {
  pub fn new(data: T) -> Self {
    Self {
      inner: Mutex::new(data),
      waiters: Mutex::new(VecDeque::new()),
    }
  }

  /// Acquires the lock synchronously (blocking).
  pub fn lock(&self) -> HybridMutexGuard<'_, T> {
    HybridMutexGuard {
      waiters: &self.waiters,
      guard: Some(self.inner.lock()),
    }
  }

  /// Acquires the lock asynchronously.
  ///
  /// This will not block the OS thread. If the lock is contended, the future
  /// will yield until it is woken up.
  pub fn lock_async(&self) -> LockFuture<'_, T> {
    LockFuture { lock: self }
  }

  fn try_acquire(&self) -> Option<HybridMutexGuard<'_, T>> {
    self.inner.try_lock().map(|guard| HybridMutexGuard {
      waiters: &self.waiters,
      guard: Some(guard),
    })
  }
}

/// RAII guard for `HybridMutex`. Dropping it wakes the pending tasks.
pub(crate) struct HybridMutexGuard<'a, T> {
  waiters: &'a Mutex<VecDeque<Waker>>,
  guard: Option<MutexGuard<'a, T>>,
}

impl<T> Drop for HybridMutexGuard<'_, T> {
  fn drop(&mut self) {
    // Release before waking, otherwise the woken task can observe the lock
    // still held, re-queue itself and never be woken again.
    drop(self.guard.take());

    // A woken task may be dropped before it polls again, so every queued
    // task is woken rather than just the first.
    let waiters = std::mem::take(&mut *self.waiters.lock());
    for waker in waiters {
      waker.wake();
    }
  }
}

impl<T> Deref for HybridMutexGuard<'_, T> {
  type Target = T;
  fn deref(&self) -> &Self::Target {
    // `guard` is only `None` inside `drop`.
    match &self.guard {
      Some(guard) => guard,
      None => unreachable!("guard accessed after release"),
    }
  }
}

impl<T> DerefMut for HybridMutexGuard<'_, T> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    match &mut self.guard {
      Some(guard) => guard,
      None => unreachable!("guard accessed after release"),
    }
  }
}

/// The `Future` returned by `HybridMutex::lock_async()`.
#[must_use = "futures do nothing unless you .await or poll them"]
pub(crate) struct LockFuture<'a, T> {
  lock: &'a HybridMutex<T>,
}

impl<'a, T> Future for LockFuture<'a, T> {
  type Output = HybridMutexGuard<'a, T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    // Fast path: Try to acquire the lock without parking.
    if let Some(guard) = self.lock.try_acquire() {
      return Poll::Ready(guard);
    }

    // Slow path: The lock is contended. Park this task.
    let mut waiters_guard = self.lock.waiters.lock();

    // The holder may have released between the `try_lock` above and us
    // taking the waiters lock; re-check to avoid a lost wakeup.
    if let Some(guard) = self.lock.try_acquire() {
      return Poll::Ready(guard);
    }

    if !waiters_guard.iter().any(|w| w.will_wake(cx.waker())) {
      waiters_guard.push_back(cx.waker().clone());
    }

    Poll::Pending
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::Arc;

  #[test]
  fn sync_lock_guards_data() {
    let lock = HybridMutex::new(0);
    *lock.lock() += 5;
    assert_eq!(*lock.lock(), 5);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn async_and_sync_lockers_interleave() {
    let lock = Arc::new(HybridMutex::new(0u64));
    let mut tasks = Vec::new();
    for _ in 0..8 {
      let lock = lock.clone();
      tasks.push(tokio::spawn(async move {
        for _ in 0..1_000 {
          *lock.lock_async().await += 1;
        }
      }));
    }
    let blocking = {
      let lock = lock.clone();
      std::thread::spawn(move || {
        for _ in 0..1_000 {
          *lock.lock() += 1;
        }
      })
    };
    for task in tasks {
      task.await.unwrap();
    }
    blocking.join().unwrap();
    assert_eq!(*lock.lock(), 9_000);
  }
}
