use crate::error::InsertError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

pub(crate) type InsertResult<V> = Result<Arc<V>, InsertError>;

/// Represents a waiter parked on a `Promise`.
enum Waiter {
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

enum State<V> {
  Pending,
  Complete(InsertResult<V>),
}

struct Inner<V> {
  state: State<V>,
  waiters: VecDeque<Waiter>,
}

/// The write side of a population. Owned by the pending item and the active
/// insert cookie; resolved exactly once.
pub(crate) struct Promise<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> Promise<V> {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Pending,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Completes the promise and wakes all waiters.
  ///
  /// Returns `false` if it was already complete, in which case the new result
  /// is discarded.
  pub(crate) fn complete(&self, result: InsertResult<V>) -> bool {
    let waiters = {
      let mut inner = self.inner.lock();
      if matches!(inner.state, State::Complete(_)) {
        return false;
      }
      inner.state = State::Complete(result);
      std::mem::take(&mut inner.waiters)
    };
    for waiter in waiters {
      waiter.wake();
    }
    true
  }

  fn try_get(&self) -> Option<InsertResult<V>> {
    match &self.inner.lock().state {
      State::Complete(result) => Some(result.clone()),
      State::Pending => None,
    }
  }

  fn wait(&self) -> InsertResult<V> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        State::Complete(result) => return result.clone(),
        State::Pending => {
          inner.waiters.push_back(Waiter::Sync(thread::current()));
          drop(inner); // Unlock before parking.
          thread::park();
          inner = self.inner.lock();
        }
      }
    }
  }

  fn poll_result(&self, cx: &mut Context<'_>) -> Poll<InsertResult<V>> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Complete(result) => Poll::Ready(result.clone()),
      State::Pending => {
        let already_queued = inner.waiters.iter().any(|waiter| match waiter {
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

enum Repr<V> {
  Ready(InsertResult<V>),
  Shared(Arc<Promise<V>>),
}

/// The eventual value of a key.
///
/// Returned by [`lookup`](crate::SlruCache::lookup) and held by every
/// [`InsertCookie`](crate::InsertCookie). All clones observe the same outcome.
/// It can be `.await`ed from async code or blocked on with [`wait`](Self::wait)
/// from a plain thread.
pub struct ValueFuture<V> {
  repr: Repr<V>,
}

impl<V> ValueFuture<V> {
  pub(crate) fn ready(value: Arc<V>) -> Self {
    Self {
      repr: Repr::Ready(Ok(value)),
    }
  }

  pub(crate) fn failed(error: InsertError) -> Self {
    Self {
      repr: Repr::Ready(Err(error)),
    }
  }

  pub(crate) fn shared(promise: Arc<Promise<V>>) -> Self {
    Self {
      repr: Repr::Shared(promise),
    }
  }

  /// Returns `true` once the outcome is known.
  pub fn is_ready(&self) -> bool {
    self.try_get().is_some()
  }

  /// Returns the outcome without blocking, or `None` while still pending.
  pub fn try_get(&self) -> Option<Result<Arc<V>, InsertError>> {
    match &self.repr {
      Repr::Ready(result) => Some(result.clone()),
      Repr::Shared(promise) => promise.try_get(),
    }
  }

  /// Blocks the current thread until the outcome is known.
  pub fn wait(&self) -> Result<Arc<V>, InsertError> {
    match &self.repr {
      Repr::Ready(result) => result.clone(),
      Repr::Shared(promise) => promise.wait(),
    }
  }
}

impl<V> Clone for ValueFuture<V> {
  fn clone(&self) -> Self {
    let repr = match &self.repr {
      Repr::Ready(result) => Repr::Ready(result.clone()),
      Repr::Shared(promise) => Repr::Shared(promise.clone()),
    };
    Self { repr }
  }
}

impl<V> fmt::Debug for ValueFuture<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ValueFuture")
      .field("ready", &self.is_ready())
      .finish_non_exhaustive()
  }
}

impl<V> Future for ValueFuture<V> {
  type Output = Result<Arc<V>, InsertError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match &self.repr {
      Repr::Ready(result) => Poll::Ready(result.clone()),
      Repr::Shared(promise) => promise.poll_result(cx),
    }
  }
}
