//! Offline-first loading of feed items and their images.
//!
//! Remote loaders, cache loaders and the combinators in [`loader`] all share
//! one completion-style capability, so chains are assembled by composition:
//! a remote loader wrapped in a write-through [`loader::CachingDecorator`],
//! falling back to the cache through a [`loader::FallbackComposite`], with
//! delivery pinned to one executor by an [`loader::ExecutionContextDecorator`].

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod loader;
pub mod logging;
pub mod serial;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{LoadError, LoadResult, StoreError};
pub use loader::{Loader, LoaderExt};
pub use task::Task;
