//! Loader capability and the generic combinators built on it.
//!
//! Every concrete loader (remote, cache) implements [`Loader`]; the
//! combinators here compose them without knowing which is which:
//! - [`FallbackComposite`] tries a fallback after the primary fails
//! - [`CachingDecorator`] writes successful results through to a cache
//! - [`ExecutionContextDecorator`] pins completion delivery to one executor

mod caching;
mod dispatch;
mod fallback;

pub use caching::{AppendingWriter, CacheWriter, CachingDecorator};
pub use dispatch::{DispatchQueue, ExecutionContextDecorator, Executor, Job};
pub use fallback::FallbackComposite;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::{LoadError, LoadResult};
use crate::task::{Completion, Task};

/// Something that produces an `Output` for a `Request`, asynchronously.
///
/// `load` returns immediately; the completion fires later, at most once,
/// on a thread of the implementation's choosing.
pub trait Loader: Send + Sync + 'static {
  type Request: Clone + Send + 'static;
  type Output: Send + 'static;

  fn load(&self, request: Self::Request, completion: Completion<Self::Output>) -> Task;
}

impl<L: Loader + ?Sized> Loader for Arc<L> {
  type Request = L::Request;
  type Output = L::Output;

  fn load(&self, request: Self::Request, completion: Completion<Self::Output>) -> Task {
    (**self).load(request, completion)
  }
}

/// Future adapter for the completion-style API.
pub trait LoaderExt: Loader {
  /// Start a load and await its result. Dropping the future cancels the task.
  fn load_async(&self, request: Self::Request) -> LoadFuture<Self::Output> {
    LoadFuture::start(|completion| self.load(request, completion))
  }
}

impl<L: Loader + ?Sized> LoaderExt for L {}

/// Result of a completion-style operation, as a future.
///
/// Resolves to `LoadError::Canceled` if the completion is dropped without
/// firing (task canceled, or owner disposed).
pub struct LoadFuture<T> {
  rx: oneshot::Receiver<LoadResult<T>>,
  task: Task,
}

impl<T: Send + 'static> LoadFuture<T> {
  /// Run `op` with a completion that feeds this future.
  pub fn start(op: impl FnOnce(Completion<T>) -> Task) -> Self {
    let (tx, rx) = oneshot::channel();
    let task = op(Box::new(move |result| {
      let _ = tx.send(result);
    }));
    Self { rx, task }
  }
}

impl<T> Future for LoadFuture<T> {
  type Output = LoadResult<T>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match Pin::new(&mut self.rx).poll(cx) {
      Poll::Ready(Ok(result)) => Poll::Ready(result),
      Poll::Ready(Err(_)) => Poll::Ready(Err(LoadError::Canceled)),
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Drop for LoadFuture<T> {
  fn drop(&mut self) {
    self.task.cancel();
  }
}
