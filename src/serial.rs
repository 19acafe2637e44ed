//! Serial job queue backed by a dedicated worker thread.
//!
//! Jobs run one at a time, in submission order, against state owned by the
//! worker. Stores use it to linearize their operations; the dispatch queue
//! uses it as a designated execution context.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::ThreadId;

use tokio::sync::{mpsc, watch};
use tracing::error;

/// A queued unit of work. Receives `None` when the worker is gone.
type Job<S> = Box<dyn FnOnce(Option<&mut S>) + Send + 'static>;

pub struct SerialQueue<S> {
  tx: mpsc::UnboundedSender<Job<S>>,
  pending: Arc<watch::Sender<usize>>,
  thread: ThreadId,
  label: String,
}

impl<S: Send + 'static> SerialQueue<S> {
  /// Spawn the worker thread, handing it ownership of `state`.
  pub fn spawn(label: &str, mut state: S) -> std::io::Result<Self> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();
    let (pending, _) = watch::channel(0usize);
    let pending = Arc::new(pending);

    let worker_pending = Arc::clone(&pending);
    let worker_label = label.to_string();
    let handle = std::thread::Builder::new()
      .name(label.to_string())
      .spawn(move || {
        while let Some(job) = rx.blocking_recv() {
          // A panicking job must not take the queue down with it.
          if catch_unwind(AssertUnwindSafe(|| job(Some(&mut state)))).is_err() {
            error!(queue = %worker_label, "job panicked");
          }
          worker_pending.send_modify(|n| *n = n.saturating_sub(1));
        }
      })?;

    Ok(Self {
      tx,
      pending,
      thread: handle.thread().id(),
      label: label.to_string(),
    })
  }

  /// Enqueue `job`. If the worker is gone the job runs immediately on the
  /// calling thread with `None`.
  pub fn submit(&self, job: impl FnOnce(Option<&mut S>) + Send + 'static) {
    self.pending.send_modify(|n| *n += 1);
    if let Err(mpsc::error::SendError(job)) = self.tx.send(Box::new(job)) {
      self.pending.send_modify(|n| *n = n.saturating_sub(1));
      error!(queue = %self.label, "worker is gone, rejecting job");
      job(None);
    }
  }

  /// Whether the caller is running on this queue's worker thread.
  pub fn is_current(&self) -> bool {
    std::thread::current().id() == self.thread
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  /// Resolve once every submitted job, including jobs submitted by running
  /// jobs, has finished.
  pub async fn wait_idle(&self) {
    let mut rx = self.pending.subscribe();
    // Sender lives in self, so the channel cannot close while we wait.
    let _ = rx.wait_for(|n| *n == 0).await;
  }
}
