//! Cancellable task handles and one-shot completion delivery.
//!
//! Every asynchronous operation in this crate takes a [`Completion`] and
//! returns a [`Task`]. The completion sits in a [`Delivery`] slot until the
//! operation finishes or the task is canceled, whichever happens first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LoadResult;

/// Callback receiving the outcome of an operation. Fires at most once.
pub type Completion<T> = Box<dyn FnOnce(LoadResult<T>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Pending,
  Completed,
  Canceled,
}

enum Slot<T> {
  Pending(Completion<T>),
  Completed,
  Canceled,
}

/// Holds a pending completion and performs exactly one terminal transition.
///
/// `complete` and `cancel` race freely; whichever takes the slot first wins
/// and the other becomes a no-op.
pub struct Delivery<T> {
  slot: Mutex<Slot<T>>,
}

impl<T: 'static> Delivery<T> {
  pub fn new(completion: Completion<T>) -> Arc<Self> {
    Arc::new(Self {
      slot: Mutex::new(Slot::Pending(completion)),
    })
  }

  /// Fire the completion with `result` unless the slot already transitioned.
  ///
  /// Returns whether the completion was invoked. The callback runs after the
  /// internal lock is released, so it may call back into this delivery.
  pub fn complete(&self, result: LoadResult<T>) -> bool {
    let completion = {
      let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
      match std::mem::replace(&mut *slot, Slot::Completed) {
        Slot::Pending(completion) => completion,
        other => {
          *slot = other;
          return false;
        }
      }
    };
    completion(result);
    true
  }

  /// Drop the pending completion. Returns whether this call did the transition.
  pub fn cancel(&self) -> bool {
    let previous = {
      let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
      match *slot {
        Slot::Pending(_) => std::mem::replace(&mut *slot, Slot::Canceled),
        _ => return false,
      }
    };
    drop(previous);
    true
  }

  pub fn state(&self) -> TaskState {
    match *self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
      Slot::Pending(_) => TaskState::Pending,
      Slot::Completed => TaskState::Completed,
      Slot::Canceled => TaskState::Canceled,
    }
  }
}

type CancelHook = Box<dyn FnOnce() + Send + 'static>;

struct TaskInner {
  canceled: AtomicBool,
  on_cancel: Mutex<Option<CancelHook>>,
}

/// Handle to one in-flight operation.
///
/// Dropping a `Task` does not cancel it. `cancel` is idempotent, callable
/// from any thread, and a no-op once the operation has delivered.
#[derive(Clone)]
pub struct Task {
  inner: Arc<TaskInner>,
}

impl Task {
  /// Task whose cancellation runs `on_cancel` exactly once.
  pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      inner: Arc::new(TaskInner {
        canceled: AtomicBool::new(false),
        on_cancel: Mutex::new(Some(Box::new(on_cancel))),
      }),
    }
  }

  /// Task that cancels by suppressing `delivery`.
  pub fn for_delivery<T: 'static>(delivery: &Arc<Delivery<T>>) -> Self {
    let delivery = Arc::clone(delivery);
    Self::new(move || {
      delivery.cancel();
    })
  }

  /// Task with nothing to cancel.
  pub fn detached() -> Self {
    Self {
      inner: Arc::new(TaskInner {
        canceled: AtomicBool::new(false),
        on_cancel: Mutex::new(None),
      }),
    }
  }

  pub fn cancel(&self) {
    if self.inner.canceled.swap(true, Ordering::AcqRel) {
      return;
    }
    let hook = self
      .inner
      .on_cancel
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(hook) = hook {
      hook();
    }
  }

  pub fn is_canceled(&self) -> bool {
    self.inner.canceled.load(Ordering::Acquire)
  }
}

impl std::fmt::Debug for Task {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Task")
      .field("canceled", &self.is_canceled())
      .finish()
  }
}

/// Owner side of a liveness flag. Flips to dead when dropped.
///
/// Loaders keep one of these and hand out [`LivenessToken`]s to the
/// callbacks they register with stores and sub-loaders. A callback that
/// finds its token dead stays silent.
#[derive(Debug)]
pub struct Liveness {
  alive: Arc<AtomicBool>,
}

impl Liveness {
  pub fn new() -> Self {
    Self {
      alive: Arc::new(AtomicBool::new(true)),
    }
  }

  pub fn token(&self) -> LivenessToken {
    LivenessToken {
      alive: Arc::clone(&self.alive),
    }
  }
}

impl Default for Liveness {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for Liveness {
  fn drop(&mut self) {
    self.alive.store(false, Ordering::Release);
  }
}

#[derive(Debug, Clone)]
pub struct LivenessToken {
  alive: Arc<AtomicBool>,
}

impl LivenessToken {
  pub fn is_alive(&self) -> bool {
    self.alive.load(Ordering::Acquire)
  }
}
