//! In-memory store with the same ordering guarantees as the SQLite one.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use super::store::{CachedSnapshot, FeedStore, ImageInsertPolicy, ImageStore, StoreCompletion};
use crate::error::StoreError;
use crate::feed::ResourceItem;
use crate::serial::SerialQueue;

#[derive(Debug, Default)]
struct MemoryState {
  snapshot: Option<CachedSnapshot>,
  images: HashMap<Url, Vec<u8>>,
}

/// Store that keeps everything in process memory.
///
/// Every write builds its new value first and applies it with a single
/// assignment, so there is no partial state to roll back.
pub struct InMemoryStore {
  queue: SerialQueue<MemoryState>,
  image_policy: ImageInsertPolicy,
}

impl InMemoryStore {
  pub fn new() -> Result<Self, StoreError> {
    let queue = SerialQueue::spawn("feedcache-memory-store", MemoryState::default())?;
    Ok(Self {
      queue,
      image_policy: ImageInsertPolicy::default(),
    })
  }

  pub fn with_image_policy(mut self, policy: ImageInsertPolicy) -> Self {
    self.image_policy = policy;
    self
  }

  /// Resolve once all submitted operations have finished.
  pub async fn wait_idle(&self) {
    self.queue.wait_idle().await
  }

  fn read<T: Send + 'static>(
    &self,
    op: impl FnOnce(&MemoryState) -> T + Send + 'static,
    completion: StoreCompletion<T>,
  ) {
    self.queue.submit(move |state| match state {
      Some(state) => completion(Ok(op(state))),
      None => completion(Err(StoreError::Closed)),
    });
  }

  fn write(
    &self,
    mutation: impl FnOnce(&mut MemoryState) + Send + 'static,
    completion: StoreCompletion<()>,
  ) {
    self.queue.submit(move |state| match state {
      Some(state) => {
        mutation(state);
        completion(Ok(()));
      }
      None => completion(Err(StoreError::Closed)),
    });
  }
}

impl FeedStore for InMemoryStore {
  fn delete(&self, completion: StoreCompletion<()>) {
    self.write(|state| state.snapshot = None, completion);
  }

  fn persist(
    &self,
    items: Vec<ResourceItem>,
    timestamp: DateTime<Utc>,
    completion: StoreCompletion<()>,
  ) {
    let snapshot = CachedSnapshot { items, timestamp };
    self.write(move |state| state.snapshot = Some(snapshot), completion);
  }

  fn retrieve(&self, completion: StoreCompletion<Option<CachedSnapshot>>) {
    self.read(|state| state.snapshot.clone(), completion);
  }
}

impl ImageStore for InMemoryStore {
  fn insert(&self, url: &Url, data: Vec<u8>, completion: StoreCompletion<()>) {
    let url = url.clone();
    let policy = self.image_policy;
    self.write(
      move |state| {
        let referenced = state
          .snapshot
          .as_ref()
          .is_some_and(|snapshot| snapshot.items.iter().any(|item| item.url() == &url));
        if policy == ImageInsertPolicy::RequireSnapshotItem && !referenced {
          debug!(%url, "no snapshot item for image, skipping insert");
          return;
        }
        state.images.insert(url, data);
      },
      completion,
    );
  }

  fn retrieve_image(&self, url: &Url, completion: StoreCompletion<Option<Vec<u8>>>) {
    let url = url.clone();
    self.read(move |state| state.images.get(&url).cloned(), completion);
  }
}
