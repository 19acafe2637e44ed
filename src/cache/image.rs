//! Cache-aside loader for image bytes.

use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::deliver;
use super::store::ImageStore;
use crate::error::LoadError;
use crate::loader::{CacheWriter, Loader};
use crate::task::{Completion, Delivery, Liveness, Task};

/// Serves and saves image bytes through an [`ImageStore`].
///
/// Images never expire; a miss is reported as `NotFound` so a fallback
/// composite can go to the network.
pub struct ImageCacheLoader<S> {
  store: Arc<S>,
  liveness: Liveness,
}

impl<S: ImageStore> ImageCacheLoader<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      liveness: Liveness::new(),
    }
  }

  pub fn save(&self, url: &Url, data: Vec<u8>, completion: Completion<()>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let token = self.liveness.token();

    self.store.insert(
      url,
      data,
      Box::new(move |result| {
        deliver(&token, &target, result.map_err(LoadError::InsertionFailed));
      }),
    );

    Task::for_delivery(&delivery)
  }
}

impl<S: ImageStore> Loader for ImageCacheLoader<S> {
  type Request = Url;
  type Output = Vec<u8>;

  fn load(&self, url: Url, completion: Completion<Vec<u8>>) -> Task {
    let delivery = Delivery::new(completion);
    let target = Arc::clone(&delivery);
    let token = self.liveness.token();

    self.store.retrieve_image(
      &url,
      Box::new(move |result| {
        let outcome = match result {
          Ok(Some(data)) => Ok(data),
          Ok(None) => Err(LoadError::NotFound),
          Err(error) => Err(LoadError::RetrievalFailed(error)),
        };
        deliver(&token, &target, outcome);
      }),
    );

    Task::for_delivery(&delivery)
  }
}

impl<S: ImageStore> CacheWriter<Url, Vec<u8>> for ImageCacheLoader<S> {
  fn write_back(&self, url: &Url, data: &Vec<u8>) {
    let bytes = data.len();
    let target = url.clone();
    self.save(
      url,
      data.clone(),
      Box::new(move |result| match result {
        Ok(()) => debug!(url = %target, bytes, "cached image"),
        Err(error) => debug!(url = %target, %error, "failed to cache image"),
      }),
    );
  }
}
