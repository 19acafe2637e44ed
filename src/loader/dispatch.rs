//! Delivery-context normalization.

use std::sync::Arc;
use tracing::warn;

use super::Loader;
use crate::serial::SerialQueue;
use crate::task::{Completion, Delivery, Task};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that completions can be marshalled onto.
pub trait Executor: Send + Sync + 'static {
  /// Whether the calling thread already runs on this executor.
  fn is_current(&self) -> bool;

  fn execute(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
  fn is_current(&self) -> bool {
    (**self).is_current()
  }

  fn execute(&self, job: Job) {
    (**self).execute(job)
  }
}

/// Executor backed by one dedicated, named thread. Jobs run in FIFO order.
pub struct DispatchQueue {
  queue: SerialQueue<()>,
}

impl DispatchQueue {
  pub fn new(label: &str) -> std::io::Result<Self> {
    Ok(Self {
      queue: SerialQueue::spawn(label, ())?,
    })
  }

  pub fn label(&self) -> &str {
    self.queue.label()
  }
}

impl Executor for DispatchQueue {
  fn is_current(&self) -> bool {
    self.queue.is_current()
  }

  fn execute(&self, job: Job) {
    let label = self.queue.label().to_string();
    self.queue.submit(move |worker| match worker {
      Some(()) => job(),
      None => warn!(queue = %label, "dispatch queue is gone, dropping job"),
    });
  }
}

/// Delivers every completion of `inner` on `executor`.
///
/// Runs the completion inline when it already arrives on the executor,
/// otherwise hands it over. Canceling the task also suppresses a result that
/// is already queued on the executor. Only the context of each single
/// delivery is normalized; nothing is promised about ordering across calls.
pub struct ExecutionContextDecorator<L, E> {
  inner: L,
  executor: Arc<E>,
}

impl<L: Loader, E: Executor> ExecutionContextDecorator<L, E> {
  pub fn new(inner: L, executor: Arc<E>) -> Self {
    Self { inner, executor }
  }
}

impl<L: Loader, E: Executor> Loader for ExecutionContextDecorator<L, E> {
  type Request = L::Request;
  type Output = L::Output;

  fn load(&self, request: Self::Request, completion: Completion<Self::Output>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let executor = Arc::clone(&self.executor);
    let inner = self.inner.load(
      request,
      Box::new(move |result| {
        if executor.is_current() {
          target.complete(result);
        } else {
          // A cancel landing before the job runs still wins.
          executor.execute(Box::new(move || {
            target.complete(result);
          }));
        }
      }),
    );

    Task::new(move || {
      delivery.cancel();
      inner.cancel();
    })
  }
}
