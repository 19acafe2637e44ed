//! Serde-deserializable types matching the feed API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use url::Url;

use super::types::ResourceItem;
use crate::error::{LoadError, LoadResult};

const OK: u16 = 200;

#[derive(Debug, Deserialize)]
pub struct ApiFeedResponse {
  pub items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
pub struct ApiItem {
  pub id: String,
  pub description: Option<String>,
  pub location: Option<String>,
  pub image: Url,
}

impl From<ApiItem> for ResourceItem {
  fn from(item: ApiItem) -> Self {
    let mut resource = ResourceItem::new(item.id, item.image);
    if let Some(description) = item.description {
      resource = resource.with_description(description);
    }
    if let Some(location) = item.location {
      resource = resource.with_location(location);
    }
    resource
  }
}

/// Map a feed response to items. Anything but a 200 with a decodable body is
/// `InvalidData`.
pub fn map_items(status: u16, body: &[u8]) -> LoadResult<Vec<ResourceItem>> {
  if status != OK {
    return Err(LoadError::InvalidData);
  }

  let response: ApiFeedResponse =
    serde_json::from_slice(body).map_err(|_| LoadError::InvalidData)?;

  Ok(response.items.into_iter().map(ResourceItem::from).collect())
}

/// Map an image response to its bytes. Empty bodies are `InvalidData`.
pub fn map_image(status: u16, body: &[u8]) -> LoadResult<Vec<u8>> {
  if status != OK || body.is_empty() {
    return Err(LoadError::InvalidData);
  }
  Ok(body.to_vec())
}
