//! Remote loaders fetching the feed and images over HTTP.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use super::api_types::{map_image, map_items};
use super::types::ResourceItem;
use crate::error::{LoadError, LoadResult};
use crate::loader::Loader;
use crate::task::{Completion, Delivery, Task};

/// Loads the feed from its HTTP endpoint.
///
/// Requests run as tasks on the given runtime; canceling the returned
/// [`Task`] aborts the request.
#[derive(Clone)]
pub struct RemoteResourceLoader {
  client: reqwest::Client,
  url: Url,
  runtime: Handle,
}

impl RemoteResourceLoader {
  pub fn new(client: reqwest::Client, url: Url, runtime: Handle) -> Self {
    Self {
      client,
      url,
      runtime,
    }
  }

  /// Loader for the page following the item with id `last_id`.
  pub fn page_after(&self, last_id: &str) -> Self {
    let mut url = self.url.clone();
    url.query_pairs_mut().append_pair("after_id", last_id);
    Self {
      url,
      ..self.clone()
    }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl Loader for RemoteResourceLoader {
  type Request = ();
  type Output = Vec<ResourceItem>;

  fn load(&self, _request: (), completion: Completion<Vec<ResourceItem>>) -> Task {
    let client = self.client.clone();
    let url = self.url.clone();
    spawn_request(&self.runtime, completion, async move {
      let (status, body) = fetch(&client, &url).await?;
      map_items(status, &body)
    })
  }
}

/// Loads image bytes from the URL given as the request.
#[derive(Clone)]
pub struct RemoteImageLoader {
  client: reqwest::Client,
  runtime: Handle,
}

impl RemoteImageLoader {
  pub fn new(client: reqwest::Client, runtime: Handle) -> Self {
    Self { client, runtime }
  }
}

impl Loader for RemoteImageLoader {
  type Request = Url;
  type Output = Vec<u8>;

  fn load(&self, url: Url, completion: Completion<Vec<u8>>) -> Task {
    let client = self.client.clone();
    spawn_request(&self.runtime, completion, async move {
      let (status, body) = fetch(&client, &url).await?;
      map_image(status, &body)
    })
  }
}

fn spawn_request<T, F>(runtime: &Handle, completion: Completion<T>, request: F) -> Task
where
  T: Send + 'static,
  F: std::future::Future<Output = LoadResult<T>> + Send + 'static,
{
  let delivery = Delivery::new(completion);
  let target = Arc::clone(&delivery);
  let handle = runtime.spawn(async move {
    target.complete(request.await);
  });
  let abort = handle.abort_handle();
  Task::new(move || {
    delivery.cancel();
    abort.abort();
  })
}

async fn fetch(client: &reqwest::Client, url: &Url) -> LoadResult<(u16, Vec<u8>)> {
  debug!(%url, "requesting");
  let response = client
    .get(url.clone())
    .send()
    .await
    .map_err(|e| LoadError::Connectivity(e.to_string()))?;
  let status = response.status().as_u16();
  let body = response
    .bytes()
    .await
    .map_err(|e| LoadError::Connectivity(e.to_string()))?;
  debug!(%url, status, bytes = body.len(), "response received");
  Ok((status, body.to_vec()))
}
