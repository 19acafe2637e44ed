//! Feed items and the remote loaders that fetch them.

mod api_types;
mod remote;
mod types;

pub use api_types::{map_image, map_items};
pub use remote::{RemoteImageLoader, RemoteResourceLoader};
pub use types::ResourceItem;
