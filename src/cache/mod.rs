//! Local persistence for the feed and its images.
//!
//! This module provides:
//! - Store backends (SQLite on disk, in-memory for tests) that linearize
//!   every operation on one instance
//! - A freshness policy for the feed snapshot
//! - Cache-aside loaders that read, validate, and write through the stores

mod image;
mod memory;
mod policy;
mod resource;
mod sqlite;
mod store;

pub use image::ImageCacheLoader;
pub use memory::InMemoryStore;
pub use policy::{CachePolicy, MAX_AGE_DAYS};
pub use resource::ResourceCacheLoader;
pub use sqlite::SqliteStore;
pub use store::{CachedSnapshot, FeedStore, ImageInsertPolicy, ImageStore, StoreCompletion};

use crate::error::LoadResult;
use crate::task::{Delivery, LivenessToken};

/// Complete `delivery` unless the loader that issued `token` is gone, in
/// which case the completion is dropped unfired.
fn deliver<T: 'static>(token: &LivenessToken, delivery: &Delivery<T>, result: LoadResult<T>) {
  if token.is_alive() {
    delivery.complete(result);
  } else {
    delivery.cancel();
  }
}
