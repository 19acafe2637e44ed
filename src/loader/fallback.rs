//! Primary-with-fallback combinator.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use super::Loader;
use crate::error::LoadResult;
use crate::task::{Completion, Delivery, Liveness, LivenessToken, Task, TaskState};

/// Loads from `primary`; if that fails, loads once from `fallback` and
/// delivers whatever it produces.
///
/// At most one of the two is in flight at a time. Canceling the returned
/// task cancels whichever is active and silences delivery. Dropping the
/// composite silences delivery too.
pub struct FallbackComposite<P, F> {
  primary: Arc<P>,
  fallback: Arc<F>,
  liveness: Liveness,
}

impl<P, F> FallbackComposite<P, F>
where
  P: Loader,
  F: Loader<Request = P::Request, Output = P::Output>,
{
  pub fn new(primary: P, fallback: F) -> Self {
    Self {
      primary: Arc::new(primary),
      fallback: Arc::new(fallback),
      liveness: Liveness::new(),
    }
  }
}

/// Shared state of one composite load.
struct Attempt<T> {
  delivery: Arc<Delivery<T>>,
  /// Task of whichever sub-loader is currently active.
  active: Mutex<Option<Task>>,
}

impl<T: 'static> Attempt<T> {
  fn finish(&self, token: &LivenessToken, result: LoadResult<T>) {
    if token.is_alive() {
      self.delivery.complete(result);
    } else {
      self.delivery.cancel();
    }
    self.release();
  }

  /// Forget the active sub-task once the attempt is over.
  fn release(&self) {
    let finished = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
    drop(finished);
  }

  /// Record the primary's task, unless the fallback already took over or
  /// the attempt already ended (primary completed before `load` returned).
  fn track_primary(&self, task: Task) {
    let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
    if active.is_none() && self.delivery.state() == TaskState::Pending {
      *active = Some(task);
    }
  }

  fn track_fallback(&self, task: Task) {
    let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
    match self.delivery.state() {
      TaskState::Pending => *active = Some(task),
      // A cancel that landed while the fallback was starting saw the old task.
      TaskState::Canceled => {
        *active = None;
        drop(active);
        task.cancel();
      }
      TaskState::Completed => *active = None,
    }
  }

  fn cancel(&self) {
    self.delivery.cancel();
    let active = self
      .active
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    if let Some(task) = active {
      task.cancel();
    }
  }
}

impl<P, F> Loader for FallbackComposite<P, F>
where
  P: Loader,
  F: Loader<Request = P::Request, Output = P::Output>,
{
  type Request = P::Request;
  type Output = P::Output;

  fn load(&self, request: Self::Request, completion: Completion<Self::Output>) -> Task {
    let attempt = Arc::new(Attempt {
      delivery: Delivery::new(completion),
      active: Mutex::new(None),
    });

    let on_primary = {
      let attempt = Arc::clone(&attempt);
      let fallback = Arc::clone(&self.fallback);
      let token = self.liveness.token();
      let request = request.clone();
      move |result: LoadResult<P::Output>| {
        let error = match result {
          Ok(value) => return attempt.finish(&token, Ok(value)),
          Err(error) => error,
        };
        if !token.is_alive() {
          attempt.delivery.cancel();
          attempt.release();
          return;
        }
        if attempt.delivery.state() != TaskState::Pending {
          attempt.release();
          return;
        }

        debug!(%error, "primary loader failed, trying fallback");
        let on_fallback = {
          let attempt = Arc::clone(&attempt);
          let token = token.clone();
          move |result| attempt.finish(&token, result)
        };
        let task = fallback.load(request, Box::new(on_fallback));
        attempt.track_fallback(task);
      }
    };

    let task = self.primary.load(request, Box::new(on_primary));
    attempt.track_primary(task);

    Task::new(move || attempt.cancel())
  }
}
