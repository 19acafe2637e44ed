//! Cache-aside loader for the feed snapshot.

use std::sync::Arc;
use tracing::{debug, warn};

use super::deliver;
use super::policy::CachePolicy;
use super::store::FeedStore;
use crate::clock::Clock;
use crate::error::LoadError;
use crate::feed::ResourceItem;
use crate::loader::{CacheWriter, Loader};
use crate::task::{Completion, Delivery, Liveness, LivenessToken, Task};

/// Loads, validates, and saves the feed snapshot held by a [`FeedStore`].
///
/// Store work that was started keeps going after the loader is dropped, but
/// no completion is delivered once it is gone.
pub struct ResourceCacheLoader<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  policy: CachePolicy,
  liveness: Liveness,
}

impl<S: FeedStore> ResourceCacheLoader<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      clock,
      policy: CachePolicy::default(),
      liveness: Liveness::new(),
    }
  }

  pub fn with_policy(mut self, policy: CachePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Evict the snapshot if it cannot be read or has expired.
  ///
  /// Reports the deletion outcome when a deletion was needed, success
  /// otherwise. A failed retrieval followed by a successful deletion is a
  /// success.
  pub fn validate_cache(&self, completion: Completion<()>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let token = self.liveness.token();
    let store = Arc::clone(&self.store);
    let clock = Arc::clone(&self.clock);
    let policy = self.policy;

    self.store.retrieve(Box::new(move |result| match result {
      Err(error) => {
        warn!(%error, "cache unreadable, evicting");
        evict(&*store, token, target);
      }
      Ok(Some(snapshot)) if !policy.validate(snapshot.timestamp, clock.now()) => {
        debug!(cached_at = %snapshot.timestamp, "cache expired, evicting");
        evict(&*store, token, target);
      }
      Ok(_) => deliver(&token, &target, Ok(())),
    }));

    Task::for_delivery(&delivery)
  }

  /// Replace the snapshot with `items`, stamped with the clock's now.
  ///
  /// Deletes first; a failed deletion is reported and nothing is persisted.
  pub fn save(&self, items: Vec<ResourceItem>, completion: Completion<()>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let token = self.liveness.token();
    let store = Arc::clone(&self.store);
    let clock = Arc::clone(&self.clock);

    self.store.delete(Box::new(move |result| {
      if let Err(error) = result {
        deliver(&token, &target, Err(LoadError::DeletionFailed(error)));
        return;
      }
      store.persist(
        items,
        clock.now(),
        Box::new(move |result| {
          deliver(&token, &target, result.map_err(LoadError::InsertionFailed));
        }),
      );
    }));

    Task::for_delivery(&delivery)
  }
}

fn evict<S: FeedStore>(store: &S, token: LivenessToken, delivery: Arc<Delivery<()>>) {
  store.delete(Box::new(move |result| {
    deliver(&token, &delivery, result.map_err(LoadError::DeletionFailed));
  }));
}

impl<S: FeedStore> Loader for ResourceCacheLoader<S> {
  type Request = ();
  type Output = Vec<ResourceItem>;

  /// Fresh items, or an empty list when the cache is empty or expired.
  /// Never deletes.
  fn load(&self, _request: (), completion: Completion<Vec<ResourceItem>>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let token = self.liveness.token();
    let clock = Arc::clone(&self.clock);
    let policy = self.policy;

    self.store.retrieve(Box::new(move |result| {
      let outcome = match result {
        Err(error) => Err(LoadError::RetrievalFailed(error)),
        Ok(Some(snapshot)) if policy.validate(snapshot.timestamp, clock.now()) => {
          Ok(snapshot.items)
        }
        Ok(_) => Ok(Vec::new()),
      };
      deliver(&token, &target, outcome);
    }));

    Task::for_delivery(&delivery)
  }
}

impl<S: FeedStore, R> CacheWriter<R, Vec<ResourceItem>> for ResourceCacheLoader<S> {
  fn write_back(&self, _request: &R, items: &Vec<ResourceItem>) {
    let count = items.len();
    self.save(
      items.clone(),
      Box::new(move |result| match result {
        Ok(()) => debug!(count, "cached feed snapshot"),
        Err(error) => debug!(%error, "failed to cache feed snapshot"),
      }),
    );
  }
}
