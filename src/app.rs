//! Composition root: wires the stores, remote loaders and combinators into
//! the chains the CLI runs.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};
use url::Url;

use crate::cache::{ImageCacheLoader, ResourceCacheLoader, SqliteStore};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::feed::{RemoteImageLoader, RemoteResourceLoader, ResourceItem};
use crate::loader::{
  CachingDecorator, DispatchQueue, ExecutionContextDecorator, FallbackComposite, LoadFuture,
  LoaderExt,
};

type FeedCache = Arc<ResourceCacheLoader<SqliteStore>>;
type ImageCache = Arc<ImageCacheLoader<SqliteStore>>;

/// Main application state
pub struct App {
  store: Arc<SqliteStore>,
  feed_cache: FeedCache,
  image_cache: ImageCache,
  remote_feed: RemoteResourceLoader,
  remote_images: RemoteImageLoader,
  /// Every chain delivers its completions here
  main_queue: Arc<DispatchQueue>,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let path = config.cache.db_path()?;
    let store = Arc::new(
      SqliteStore::open(&path)
        .map_err(|e| eyre!("Failed to open cache at {}: {}", path.display(), e))?
        .with_image_policy(config.cache.image_insert),
    );

    let clock = Arc::new(SystemClock);
    let feed_cache = Arc::new(
      ResourceCacheLoader::new(Arc::clone(&store), clock).with_policy(config.cache.policy()),
    );
    let image_cache = Arc::new(ImageCacheLoader::new(Arc::clone(&store)));

    let client = reqwest::Client::builder()
      .user_agent(concat!("feedcache/", env!("CARGO_PKG_VERSION")))
      .build()?;
    let runtime = Handle::current();

    Ok(Self {
      store,
      feed_cache,
      image_cache,
      remote_feed: RemoteResourceLoader::new(client.clone(), config.feed_url.clone(), runtime.clone()),
      remote_images: RemoteImageLoader::new(client, runtime),
      main_queue: Arc::new(DispatchQueue::new("main")?),
    })
  }

  /// Load the feed from the network, falling back to the cache when offline.
  /// Network results replace the cached snapshot.
  pub async fn feed(&self) -> Result<Vec<ResourceItem>> {
    let chain = ExecutionContextDecorator::new(
      FallbackComposite::new(
        CachingDecorator::new(self.remote_feed.clone(), Arc::clone(&self.feed_cache)),
        Arc::clone(&self.feed_cache),
      ),
      Arc::clone(&self.main_queue),
    );

    let items = chain.load_async(()).await?;
    info!(count = items.len(), "feed loaded");
    self.settle().await;
    Ok(items)
  }

  /// Load the page after `last_id` and append it to the cached snapshot.
  ///
  /// Returns only the new page.
  pub async fn more(&self, last_id: &str) -> Result<Vec<ResourceItem>> {
    let existing = self.feed_cache.load_async(()).await?;
    debug!(existing = existing.len(), after = last_id, "loading next page");

    let chain = ExecutionContextDecorator::new(
      CachingDecorator::paginated(
        self.remote_feed.page_after(last_id),
        Arc::clone(&self.feed_cache),
        existing,
      ),
      Arc::clone(&self.main_queue),
    );

    let page = chain.load_async(()).await?;
    info!(count = page.len(), "page loaded");
    self.settle().await;
    Ok(page)
  }

  /// Image bytes from the cache, or from the network with write-through.
  pub async fn image(&self, url: Url) -> Result<Vec<u8>> {
    let chain = ExecutionContextDecorator::new(
      FallbackComposite::new(
        Arc::clone(&self.image_cache),
        CachingDecorator::new(self.remote_images.clone(), Arc::clone(&self.image_cache)),
      ),
      Arc::clone(&self.main_queue),
    );

    let data = chain.load_async(url).await?;
    self.settle().await;
    Ok(data)
  }

  /// Evict the cached snapshot if it is unreadable or expired.
  pub async fn validate(&self) -> Result<()> {
    LoadFuture::start(|done| self.feed_cache.validate_cache(done)).await?;
    Ok(())
  }

  /// Let write-through work started by the last chain reach the store.
  async fn settle(&self) {
    self.store.wait_idle().await;
  }
}
