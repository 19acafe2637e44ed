use serde::{Deserialize, Serialize};
use url::Url;

/// One entry of the feed. Immutable once built; use the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceItem {
  id: String,
  description: Option<String>,
  location: Option<String>,
  /// Where the item's image lives
  url: Url,
}

impl ResourceItem {
  pub fn new(id: impl Into<String>, url: Url) -> Self {
    Self {
      id: id.into(),
      description: None,
      location: None,
      url,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_location(mut self, location: impl Into<String>) -> Self {
    self.location = Some(location.into());
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn location(&self) -> Option<&str> {
    self.location.as_deref()
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}
