//! Error types shared by the stores and the loaders built on top of them.

use thiserror::Error;

/// Failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to encode or decode a cached record: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("failed to prepare the store: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid timestamp '{0}' in store")]
  Timestamp(String),

  /// The store's worker thread is gone and can no longer run operations.
  #[error("store worker has shut down")]
  Closed,
}

/// Failure delivered to the caller of a loader.
///
/// `Connectivity` and `InvalidData` come from the remote side, the rest
/// from the cache side.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("connectivity error: {0}")]
  Connectivity(String),

  #[error("invalid data received from remote")]
  InvalidData,

  #[error("cache retrieval failed")]
  RetrievalFailed(#[source] StoreError),

  /// Nothing cached for the request. Not a failure of the backend.
  #[error("no cached record found")]
  NotFound,

  #[error("cache deletion failed")]
  DeletionFailed(#[source] StoreError),

  #[error("cache insertion failed")]
  InsertionFailed(#[source] StoreError),

  /// The completion was dropped without a result, e.g. the task was canceled.
  #[error("load was canceled")]
  Canceled,
}

pub type LoadResult<T> = Result<T, LoadError>;
