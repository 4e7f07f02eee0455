use crate::error::InsertError;
use crate::future::{Promise, ValueFuture};
use crate::shared::CacheShared;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// The handle returned by [`begin_insert`](crate::SlruCache::begin_insert).
///
/// Of all callers racing to insert the same absent key, exactly one receives
/// an *active* cookie. The holder of the active cookie is responsible for
/// producing the value and must finish with [`end_insert`](Self::end_insert)
/// or [`cancel`](Self::cancel). Every other caller receives an *inactive*
/// cookie whose [`value`](Self::value) future resolves once the active holder
/// is done.
///
/// Dropping an active cookie cancels the insertion with
/// [`InsertError::Aborted`], so waiters are never left hanging.
///
/// # Example
///
/// ```
/// use fibre_slru::SlruCacheBuilder;
///
/// let cache = SlruCacheBuilder::<u32, String>::new().capacity(100).build().unwrap();
///
/// let mut cookie = cache.begin_insert(7);
/// if cookie.is_active() {
///   cookie.end_insert("seven".to_string());
/// }
/// assert_eq!(*cookie.value().wait().unwrap(), "seven");
/// ```
pub struct InsertCookie<K, V, H = ahash::RandomState>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  shared: Arc<CacheShared<K, V, H>>,
  key: K,
  future: ValueFuture<V>,
  // Present while the cookie is active.
  promise: Option<Arc<Promise<V>>>,
}

impl<K, V, H> InsertCookie<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  pub(crate) fn active(shared: Arc<CacheShared<K, V, H>>, key: K, promise: Arc<Promise<V>>) -> Self {
    Self {
      shared,
      key,
      future: ValueFuture::shared(promise.clone()),
      promise: Some(promise),
    }
  }

  pub(crate) fn inactive(shared: Arc<CacheShared<K, V, H>>, key: K, future: ValueFuture<V>) -> Self {
    Self {
      shared,
      key,
      future,
      promise: None,
    }
  }

  /// Returns `true` if this cookie owns the population of its key.
  pub fn is_active(&self) -> bool {
    self.promise.is_some()
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  /// The eventual value of the key, shared with every other waiter.
  pub fn value(&self) -> ValueFuture<V> {
    self.future.clone()
  }

  /// Publishes the produced value.
  ///
  /// The value is weighed, offered to the admission hook and, if admitted,
  /// linked into the younger segment of its shard. Every waiter receives it
  /// either way. The cookie becomes inactive.
  ///
  /// # Panics
  ///
  /// Panics if the cookie is inactive.
  pub fn end_insert(&mut self, value: impl Into<Arc<V>>) {
    let Some(promise) = self.promise.take() else {
      panic!("end_insert called on an inactive insert cookie");
    };
    self.shared.end_insert(&self.key, &promise, value.into());
  }

  /// Abandons the population. Every waiter receives `error` and the key is
  /// absent again. The cookie becomes inactive.
  ///
  /// # Panics
  ///
  /// Panics if the cookie is inactive.
  pub fn cancel(&mut self, error: InsertError) {
    let Some(promise) = self.promise.take() else {
      panic!("cancel called on an inactive insert cookie");
    };
    self.shared.cancel(&self.key, &promise, error);
  }
}

impl<K, V, H> Drop for InsertCookie<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  fn drop(&mut self) {
    if let Some(promise) = self.promise.take() {
      tracing::debug!("active insert cookie dropped, aborting insertion");
      self.shared.cancel(&self.key, &promise, InsertError::Aborted);
    }
  }
}

impl<K, V, H> fmt::Debug for InsertCookie<K, V, H>
where
  K: Eq + Hash + Clone + Send + fmt::Debug,
  V: Send + Sync,
  H: BuildHasher,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InsertCookie")
      .field("key", &self.key)
      .field("active", &self.is_active())
      .field("future", &self.future)
      .finish()
  }
}
