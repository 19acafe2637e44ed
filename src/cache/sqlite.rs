//! SQLite-backed store.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use super::store::{CachedSnapshot, FeedStore, ImageInsertPolicy, ImageStore, StoreCompletion};
use crate::error::StoreError;
use crate::feed::ResourceItem;
use crate::serial::SerialQueue;

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- The one cached snapshot
CREATE TABLE IF NOT EXISTS snapshot (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    created_at TEXT NOT NULL
);

-- Snapshot items (preserves order)
CREATE TABLE IF NOT EXISTS snapshot_items (
    position INTEGER PRIMARY KEY,
    item_id TEXT NOT NULL,
    url TEXT NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshot_items_url ON snapshot_items(url);

-- Image blobs keyed by URL hash
CREATE TABLE IF NOT EXISTS image_cache (
    url_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-based store.
///
/// The connection is owned by a serial worker thread, so every operation
/// runs in submission order and completions arrive on that thread.
pub struct SqliteStore {
  queue: SerialQueue<Connection>,
  image_policy: ImageInsertPolicy,
}

impl SqliteStore {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    info!(path = %path.display(), "opened cache database");
    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    let queue = SerialQueue::spawn("feedcache-sqlite-store", conn)?;
    Ok(Self {
      queue,
      image_policy: ImageInsertPolicy::default(),
    })
  }

  pub fn with_image_policy(mut self, policy: ImageInsertPolicy) -> Self {
    self.image_policy = policy;
    self
  }

  /// Resolve once all submitted operations have finished.
  pub async fn wait_idle(&self) {
    self.queue.wait_idle().await
  }

  fn run<T: Send + 'static>(
    &self,
    op: &'static str,
    work: impl FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    completion: StoreCompletion<T>,
  ) {
    self.queue.submit(move |conn| {
      let result = match conn {
        Some(conn) => work(conn),
        None => Err(StoreError::Closed),
      };
      if let Err(error) = &result {
        debug!(op, %error, "store operation failed");
      }
      completion(result);
    });
  }
}

/// Run `mutation` in a transaction. On error the transaction is dropped,
/// which rolls it back before the error is reported.
fn write<T>(
  conn: &mut Connection,
  mutation: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
  let tx = conn.transaction()?;
  let value = mutation(&tx)?;
  tx.commit()?;
  Ok(value)
}

fn delete_snapshot(tx: &Transaction<'_>) -> Result<(), StoreError> {
  tx.execute("DELETE FROM snapshot_items", [])?;
  tx.execute("DELETE FROM snapshot", [])?;
  Ok(())
}

fn persist_snapshot(
  tx: &Transaction<'_>,
  items: &[ResourceItem],
  timestamp: DateTime<Utc>,
) -> Result<(), StoreError> {
  delete_snapshot(tx)?;
  tx.execute(
    "INSERT INTO snapshot (id, created_at) VALUES (1, ?)",
    params![format_timestamp(timestamp)],
  )?;

  let mut stmt = tx.prepare(
    "INSERT INTO snapshot_items (position, item_id, url, data)
     VALUES (?, ?, ?, ?)",
  )?;
  for (position, item) in items.iter().enumerate() {
    let data = serde_json::to_vec(item)?;
    stmt.execute(params![position, item.id(), item.url().as_str(), data])?;
  }

  Ok(())
}

fn retrieve_snapshot(conn: &Connection) -> Result<Option<CachedSnapshot>, StoreError> {
  let created_at: Option<String> = conn
    .query_row("SELECT created_at FROM snapshot WHERE id = 1", [], |row| {
      row.get(0)
    })
    .optional()?;

  let Some(created_at) = created_at else {
    return Ok(None);
  };
  let timestamp = parse_timestamp(&created_at)?;

  let mut stmt = conn.prepare("SELECT data FROM snapshot_items ORDER BY position")?;
  let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

  let mut items = Vec::new();
  for data in rows {
    items.push(serde_json::from_slice(&data?)?);
  }

  Ok(Some(CachedSnapshot { items, timestamp }))
}

fn insert_image(
  tx: &Transaction<'_>,
  url: &Url,
  data: &[u8],
  policy: ImageInsertPolicy,
) -> Result<(), StoreError> {
  if policy == ImageInsertPolicy::RequireSnapshotItem {
    let referenced: bool = tx.query_row(
      "SELECT EXISTS(SELECT 1 FROM snapshot_items WHERE url = ?)",
      params![url.as_str()],
      |row| row.get(0),
    )?;
    if !referenced {
      debug!(%url, "no snapshot item for image, skipping insert");
      return Ok(());
    }
  }

  tx.execute(
    "INSERT INTO image_cache (url_hash, url, data, cached_at)
     VALUES (?, ?, ?, datetime('now'))
     ON CONFLICT(url_hash) DO UPDATE SET data = excluded.data, cached_at = excluded.cached_at",
    params![image_key(url), url.as_str(), data],
  )?;
  Ok(())
}

fn retrieve_image(conn: &Connection, url: &Url) -> Result<Option<Vec<u8>>, StoreError> {
  let data = conn
    .query_row(
      "SELECT data FROM image_cache WHERE url_hash = ?",
      params![image_key(url)],
      |row| row.get(0),
    )
    .optional()?;
  Ok(data)
}

impl FeedStore for SqliteStore {
  fn delete(&self, completion: StoreCompletion<()>) {
    self.run("delete", |conn| write(conn, delete_snapshot), completion);
  }

  fn persist(
    &self,
    items: Vec<ResourceItem>,
    timestamp: DateTime<Utc>,
    completion: StoreCompletion<()>,
  ) {
    self.run(
      "persist",
      move |conn| write(conn, |tx| persist_snapshot(tx, &items, timestamp)),
      completion,
    );
  }

  fn retrieve(&self, completion: StoreCompletion<Option<CachedSnapshot>>) {
    self.run("retrieve", |conn| retrieve_snapshot(conn), completion);
  }
}

impl ImageStore for SqliteStore {
  fn insert(&self, url: &Url, data: Vec<u8>, completion: StoreCompletion<()>) {
    let url = url.clone();
    let policy = self.image_policy;
    self.run(
      "insert_image",
      move |conn| write(conn, |tx| insert_image(tx, &url, &data, policy)),
      completion,
    );
  }

  fn retrieve_image(&self, url: &Url, completion: StoreCompletion<Option<Vec<u8>>>) {
    let url = url.clone();
    self.run(
      "retrieve_image",
      move |conn| retrieve_image(conn, &url),
      completion,
    );
  }
}

/// SHA256 of the URL, for stable fixed-length keys.
fn image_key(url: &Url) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_str().as_bytes());
  hex::encode(hasher.finalize())
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
  timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| StoreError::Timestamp(s.to_string()))
}
