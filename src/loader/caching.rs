//! Write-through caching decorator.

use std::sync::Arc;

use super::Loader;
use crate::task::{Completion, Task};

/// Best-effort sink for values a loader produced.
///
/// Implementations start the write and return; the outcome is never
/// reported back to the caller of the decorated loader.
pub trait CacheWriter<R, T>: Send + Sync + 'static {
  fn write_back(&self, request: &R, value: &T);
}

impl<R, T, W: CacheWriter<R, T> + ?Sized> CacheWriter<R, T> for Arc<W> {
  fn write_back(&self, request: &R, value: &T) {
    (**self).write_back(request, value)
  }
}

/// Writes `existing ++ page` instead of just the page, for caching an
/// appended page of a list.
pub struct AppendingWriter<T, W> {
  existing: Vec<T>,
  inner: W,
}

impl<T, W> AppendingWriter<T, W> {
  pub fn new(existing: Vec<T>, inner: W) -> Self {
    Self { existing, inner }
  }
}

impl<R, T, W> CacheWriter<R, Vec<T>> for AppendingWriter<T, W>
where
  T: Clone + Send + Sync + 'static,
  W: CacheWriter<R, Vec<T>>,
{
  fn write_back(&self, request: &R, page: &Vec<T>) {
    let mut all = Vec::with_capacity(self.existing.len() + page.len());
    all.extend_from_slice(&self.existing);
    all.extend_from_slice(page);
    self.inner.write_back(request, &all);
  }
}

/// Forwards results from `inner` and writes successes to `cache`.
///
/// Failures pass through untouched with no write. The write is started
/// before the value is forwarded and never delays or alters delivery.
pub struct CachingDecorator<L, W> {
  inner: L,
  cache: Arc<W>,
}

impl<L, W> CachingDecorator<L, W>
where
  L: Loader,
  W: CacheWriter<L::Request, L::Output>,
{
  pub fn new(inner: L, cache: W) -> Self {
    Self {
      inner,
      cache: Arc::new(cache),
    }
  }
}

impl<L, T, W> CachingDecorator<L, AppendingWriter<T, W>>
where
  L: Loader<Output = Vec<T>>,
  T: Clone + Send + Sync + 'static,
  W: CacheWriter<L::Request, Vec<T>>,
{
  /// Decorator for a "load more" loader: persists `existing` followed by the
  /// newly loaded page.
  pub fn paginated(inner: L, cache: W, existing: Vec<T>) -> Self {
    Self::new(inner, AppendingWriter::new(existing, cache))
  }
}

impl<L, W> Loader for CachingDecorator<L, W>
where
  L: Loader,
  W: CacheWriter<L::Request, L::Output>,
{
  type Request = L::Request;
  type Output = L::Output;

  fn load(&self, request: Self::Request, completion: Completion<Self::Output>) -> Task {
    let cache = Arc::clone(&self.cache);
    let key = request.clone();
    self.inner.load(
      request,
      Box::new(move |result| {
        if let Ok(value) = &result {
          cache.write_back(&key, value);
        }
        completion(result);
      }),
    )
  }
}
