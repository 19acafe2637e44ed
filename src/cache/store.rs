//! Store capability traits and the records they hold.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::error::StoreError;
use crate::feed::ResourceItem;

/// Callback receiving the outcome of a store operation.
///
/// Runs on whatever thread the store chooses.
pub type StoreCompletion<T> = Box<dyn FnOnce(Result<T, StoreError>) + Send + 'static>;

/// The single cached feed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
  /// Items in the order they were persisted
  pub items: Vec<ResourceItem>,
  /// When the snapshot was persisted
  pub timestamp: DateTime<Utc>,
}

/// Durable backend holding at most one feed snapshot.
///
/// Operations on one instance run one at a time in submission order,
/// whichever thread submits them.
pub trait FeedStore: Send + Sync + 'static {
  /// Remove the snapshot. Succeeds when there is nothing to remove.
  fn delete(&self, completion: StoreCompletion<()>);

  /// Replace the snapshot with `items` stamped at `timestamp`.
  fn persist(
    &self,
    items: Vec<ResourceItem>,
    timestamp: DateTime<Utc>,
    completion: StoreCompletion<()>,
  );

  /// Read the snapshot, `None` when empty. Never mutates.
  fn retrieve(&self, completion: StoreCompletion<Option<CachedSnapshot>>);
}

/// Durable backend for image bytes keyed by URL.
pub trait ImageStore: Send + Sync + 'static {
  fn insert(&self, url: &Url, data: Vec<u8>, completion: StoreCompletion<()>);

  fn retrieve_image(&self, url: &Url, completion: StoreCompletion<Option<Vec<u8>>>);
}

/// What `ImageStore::insert` does for a URL that no snapshot item refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageInsertPolicy {
  /// Store the image regardless
  #[default]
  Upsert,
  /// Only store images for URLs in the current snapshot; others are a
  /// silent no-op
  RequireSnapshotItem,
}

impl<S: FeedStore + ?Sized> FeedStore for Arc<S> {
  fn delete(&self, completion: StoreCompletion<()>) {
    (**self).delete(completion)
  }

  fn persist(
    &self,
    items: Vec<ResourceItem>,
    timestamp: DateTime<Utc>,
    completion: StoreCompletion<()>,
  ) {
    (**self).persist(items, timestamp, completion)
  }

  fn retrieve(&self, completion: StoreCompletion<Option<CachedSnapshot>>) {
    (**self).retrieve(completion)
  }
}

impl<S: ImageStore + ?Sized> ImageStore for Arc<S> {
  fn insert(&self, url: &Url, data: Vec<u8>, completion: StoreCompletion<()>) {
    (**self).insert(url, data, completion)
  }

  fn retrieve_image(&self, url: &Url, completion: StoreCompletion<Option<Vec<u8>>>) {
    (**self).retrieve_image(url, completion)
  }
}
