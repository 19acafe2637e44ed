//! Shared test helpers: spies, fixtures, and store contract checks.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::cache::{CachedSnapshot, FeedStore, ImageStore, StoreCompletion};
use crate::error::{LoadResult, StoreError};
use crate::feed::ResourceItem;
use crate::loader::Loader;
use crate::task::{Completion, Task};

pub fn any_url() -> Url {
  Url::parse("https://example.com/any").unwrap()
}

pub fn unique_items(count: usize) -> Vec<ResourceItem> {
  (0..count)
    .map(|i| {
      let item = ResourceItem::new(
        format!("item-{}-{}", i, unique_suffix()),
        Url::parse(&format!("https://example.com/images/{}.png", i)).unwrap(),
      )
      .with_description(format!("description {}", i));
      if i % 2 == 0 {
        item.with_location(format!("location {}", i))
      } else {
        item
      }
    })
    .collect()
}

fn unique_suffix() -> u64 {
  use std::sync::atomic::{AtomicU64, Ordering};
  static NEXT: AtomicU64 = AtomicU64::new(0);
  NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Run a store operation and block until its completion fires.
pub fn sync_call<T: Send + 'static>(
  op: impl FnOnce(StoreCompletion<T>),
) -> Result<T, StoreError> {
  let (tx, rx) = std::sync::mpsc::channel();
  op(Box::new(move |result| {
    let _ = tx.send(result);
  }));
  rx.recv().expect("store dropped completion")
}

pub type Captured<T> = Arc<Mutex<Vec<LoadResult<T>>>>;

/// Completion that records every result it receives.
pub fn capture<T: Send + 'static>() -> (Completion<T>, Captured<T>) {
  let results: Captured<T> = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&results);
  (
    Box::new(move |result| sink.lock().unwrap().push(result)),
    results,
  )
}

// ============================================================================
// Store spy
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreMessage {
  Delete,
  Persist(Vec<ResourceItem>, DateTime<Utc>),
  Retrieve,
  Insert(Url, Vec<u8>),
  RetrieveImage(Url),
}

type Pending<T> = Mutex<Vec<Option<StoreCompletion<T>>>>;

/// Store that records calls and lets the test complete them by hand.
#[derive(Default)]
pub struct StoreSpy {
  messages: Mutex<Vec<StoreMessage>>,
  deletions: Pending<()>,
  persists: Pending<()>,
  retrievals: Pending<Option<CachedSnapshot>>,
  insertions: Pending<()>,
  image_retrievals: Pending<Option<Vec<u8>>>,
}

fn take<T>(pending: &Pending<T>, index: usize) -> StoreCompletion<T> {
  pending.lock().unwrap()[index]
    .take()
    .expect("completion already used")
}

impl StoreSpy {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn messages(&self) -> Vec<StoreMessage> {
    self.messages.lock().unwrap().clone()
  }

  pub fn complete_deletion(&self, index: usize, result: Result<(), StoreError>) {
    take(&self.deletions, index)(result)
  }

  pub fn complete_persist(&self, index: usize, result: Result<(), StoreError>) {
    take(&self.persists, index)(result)
  }

  pub fn complete_retrieval(&self, index: usize, result: Result<Option<CachedSnapshot>, StoreError>) {
    take(&self.retrievals, index)(result)
  }

  pub fn complete_insertion(&self, index: usize, result: Result<(), StoreError>) {
    take(&self.insertions, index)(result)
  }

  pub fn complete_image_retrieval(&self, index: usize, result: Result<Option<Vec<u8>>, StoreError>) {
    take(&self.image_retrievals, index)(result)
  }

  fn record<T>(&self, message: StoreMessage, pending: &Pending<T>, completion: StoreCompletion<T>) {
    self.messages.lock().unwrap().push(message);
    pending.lock().unwrap().push(Some(completion));
  }
}

impl FeedStore for StoreSpy {
  fn delete(&self, completion: StoreCompletion<()>) {
    self.record(StoreMessage::Delete, &self.deletions, completion);
  }

  fn persist(
    &self,
    items: Vec<ResourceItem>,
    timestamp: DateTime<Utc>,
    completion: StoreCompletion<()>,
  ) {
    self.record(
      StoreMessage::Persist(items, timestamp),
      &self.persists,
      completion,
    );
  }

  fn retrieve(&self, completion: StoreCompletion<Option<CachedSnapshot>>) {
    self.record(StoreMessage::Retrieve, &self.retrievals, completion);
  }
}

impl ImageStore for StoreSpy {
  fn insert(&self, url: &Url, data: Vec<u8>, completion: StoreCompletion<()>) {
    self.record(
      StoreMessage::Insert(url.clone(), data),
      &self.insertions,
      completion,
    );
  }

  fn retrieve_image(&self, url: &Url, completion: StoreCompletion<Option<Vec<u8>>>) {
    self.record(
      StoreMessage::RetrieveImage(url.clone()),
      &self.image_retrievals,
      completion,
    );
  }
}

// ============================================================================
// Loader spy
// ============================================================================

/// Loader that records requests and cancellations; completed by hand.
pub struct LoaderSpy<R, T> {
  requests: Mutex<Vec<R>>,
  completions: Mutex<Vec<Option<Completion<T>>>>,
  canceled: Arc<Mutex<Vec<usize>>>,
}

impl<R, T> LoaderSpy<R, T>
where
  R: Clone + Send + 'static,
  T: Send + 'static,
{
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      requests: Mutex::new(Vec::new()),
      completions: Mutex::new(Vec::new()),
      canceled: Arc::new(Mutex::new(Vec::new())),
    })
  }

  pub fn requests(&self) -> Vec<R> {
    self.requests.lock().unwrap().clone()
  }

  pub fn load_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  /// Indices of the loads whose task was canceled.
  pub fn canceled(&self) -> Vec<usize> {
    self.canceled.lock().unwrap().clone()
  }

  pub fn complete(&self, index: usize, result: LoadResult<T>) {
    let completion = self.completions.lock().unwrap()[index]
      .take()
      .expect("completion already used");
    completion(result);
  }
}

impl<R, T> Loader for LoaderSpy<R, T>
where
  R: Clone + Send + 'static,
  T: Send + 'static,
{
  type Request = R;
  type Output = T;

  fn load(&self, request: R, completion: Completion<T>) -> Task {
    let index = {
      let mut completions = self.completions.lock().unwrap();
      completions.push(Some(completion));
      completions.len() - 1
    };
    self.requests.lock().unwrap().push(request);
    let canceled = Arc::clone(&self.canceled);
    Task::new(move || canceled.lock().unwrap().push(index))
  }
}

// ============================================================================
// Store contract checks, run against every store implementation
// ============================================================================

pub mod store_specs {
  use super::*;
  use chrono::TimeZone;

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
  }

  fn t1() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
  }

  pub fn retrieve_on_empty_delivers_empty(store: &impl FeedStore) {
    assert_eq!(sync_call(|done| store.retrieve(done)).unwrap(), None);
    // Retrieving twice has no side effects
    assert_eq!(sync_call(|done| store.retrieve(done)).unwrap(), None);
  }

  pub fn retrieve_after_persist_delivers_snapshot(store: &impl FeedStore) {
    let items = unique_items(2);
    sync_call(|done| store.persist(items.clone(), t0(), done)).unwrap();

    let expected = CachedSnapshot {
      items,
      timestamp: t0(),
    };
    assert_eq!(sync_call(|done| store.retrieve(done)).unwrap(), Some(expected.clone()));
    assert_eq!(sync_call(|done| store.retrieve(done)).unwrap(), Some(expected));
  }

  pub fn persist_replaces_previous_snapshot(store: &impl FeedStore) {
    let first = unique_items(2);
    let second = unique_items(1);
    sync_call(|done| store.persist(first, t0(), done)).unwrap();
    sync_call(|done| store.persist(second.clone(), t1(), done)).unwrap();

    assert_eq!(
      sync_call(|done| store.retrieve(done)).unwrap(),
      Some(CachedSnapshot {
        items: second,
        timestamp: t1(),
      })
    );
  }

  pub fn delete_empties_store(store: &impl FeedStore) {
    // Deleting an empty store succeeds
    sync_call(|done| store.delete(done)).unwrap();

    sync_call(|done| store.persist(unique_items(3), t0(), done)).unwrap();
    sync_call(|done| store.delete(done)).unwrap();

    assert_eq!(sync_call(|done| store.retrieve(done)).unwrap(), None);
  }

  pub fn operations_complete_in_submission_order<S: FeedStore>(store: Arc<S>) {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = std::sync::mpsc::channel();
    let final_items = unique_items(1);

    // Each submission happens on its own thread, strictly one after another.
    let steps: Vec<Box<dyn FnOnce() + Send>> = vec![
      {
        let (store, order) = (Arc::clone(&store), Arc::clone(&order));
        Box::new(move || {
          store.persist(
            unique_items(2),
            t0(),
            Box::new(move |_| order.lock().unwrap().push("persist 1")),
          )
        })
      },
      {
        let (store, order) = (Arc::clone(&store), Arc::clone(&order));
        Box::new(move || {
          store.delete(Box::new(move |_| order.lock().unwrap().push("delete")))
        })
      },
      {
        let (store, order) = (Arc::clone(&store), Arc::clone(&order));
        let items = final_items.clone();
        Box::new(move || {
          store.persist(
            items,
            t1(),
            Box::new(move |_| {
              order.lock().unwrap().push("persist 2");
              let _ = tx.send(());
            }),
          )
        })
      },
    ];
    for step in steps {
      std::thread::spawn(step).join().unwrap();
    }

    rx.recv().unwrap();
    assert_eq!(
      *order.lock().unwrap(),
      vec!["persist 1", "delete", "persist 2"]
    );
    assert_eq!(
      sync_call(|done| store.retrieve(done)).unwrap(),
      Some(CachedSnapshot {
        items: final_items,
        timestamp: t1(),
      })
    );
  }

  pub fn concurrent_submissions_complete_in_submission_order<S: FeedStore>(store: Arc<S>) {
    const THREADS: usize = 8;
    let barrier = Arc::new(std::sync::Barrier::new(THREADS));
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = std::sync::mpsc::channel();

    let handles: Vec<_> = (0..THREADS)
      .map(|i| {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        let submitted = Arc::clone(&submitted);
        let completed = Arc::clone(&completed);
        let tx = tx.clone();
        std::thread::spawn(move || {
          barrier.wait();
          let done: StoreCompletion<()> = Box::new(move |_| {
            completed.lock().unwrap().push(i);
            let _ = tx.send(());
          });
          // Recording and submitting under one lock pins the submission order
          let mut order = submitted.lock().unwrap();
          order.push(i);
          if i % 3 == 0 {
            store.delete(done);
          } else {
            store.persist(unique_items(1), t0(), done);
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    for _ in 0..THREADS {
      rx.recv().unwrap();
    }

    assert_eq!(*completed.lock().unwrap(), *submitted.lock().unwrap());
  }

  pub fn image_insert_upserts_by_url<S: FeedStore + ImageStore>(store: &S) {
    let url = any_url();
    let other = Url::parse("https://example.com/other").unwrap();

    assert_eq!(sync_call(|done| store.retrieve_image(&url, done)).unwrap(), None);

    sync_call(|done| store.insert(&url, b"first".to_vec(), done)).unwrap();
    sync_call(|done| store.insert(&url, b"last".to_vec(), done)).unwrap();
    sync_call(|done| store.insert(&other, b"other".to_vec(), done)).unwrap();

    assert_eq!(
      sync_call(|done| store.retrieve_image(&url, done)).unwrap(),
      Some(b"last".to_vec())
    );
    assert_eq!(
      sync_call(|done| store.retrieve_image(&other, done)).unwrap(),
      Some(b"other".to_vec())
    );
  }

  pub fn image_insert_without_snapshot_item_is_noop<S: FeedStore + ImageStore>(store: &S) {
    let items = unique_items(1);
    let known = items[0].url().clone();
    let unknown = Url::parse("https://example.com/unknown.png").unwrap();
    sync_call(|done| store.persist(items, t0(), done)).unwrap();

    sync_call(|done| store.insert(&unknown, b"data".to_vec(), done)).unwrap();
    sync_call(|done| store.insert(&known, b"data".to_vec(), done)).unwrap();

    assert_eq!(sync_call(|done| store.retrieve_image(&unknown, done)).unwrap(), None);
    assert_eq!(
      sync_call(|done| store.retrieve_image(&known, done)).unwrap(),
      Some(b"data".to_vec())
    );
  }
}
