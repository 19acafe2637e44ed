use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use url::Url;

use feedcache::app::App;
use feedcache::config::Config;
use feedcache::feed::ResourceItem;

#[derive(Parser, Debug)]
#[command(name = "feedcache")]
#[command(about = "Offline-first feed and image loader with a local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load the feed, falling back to the cache when offline
  Feed,
  /// Load the page after an item and append it to the cache
  More {
    /// Id of the last item already shown
    #[arg(long)]
    after: String,
  },
  /// Load an image, from the cache when possible
  Image {
    url: Url,
    /// Write the bytes to this file instead of printing their size
    #[arg(short, long)]
    out: Option<PathBuf>,
  },
  /// Evict the cached feed if it is unreadable or expired
  Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = feedcache::logging::init(&config.log)?;

  let app = App::new(&config)?;
  match args.command {
    Command::Feed => print_items(&app.feed().await?),
    Command::More { after } => print_items(&app.more(&after).await?),
    Command::Image { url, out } => {
      let data = app.image(url).await?;
      match out {
        Some(path) => std::fs::write(&path, &data)?,
        None => println!("{} bytes", data.len()),
      }
    }
    Command::Validate => {
      app.validate().await?;
      println!("cache ok");
    }
  }

  Ok(())
}

fn print_items(items: &[ResourceItem]) {
  for item in items {
    let mut line = format!("{}\t{}", item.id(), item.url());
    if let Some(location) = item.location() {
      line.push_str(&format!("\t{}", location));
    }
    if let Some(description) = item.description() {
      line.push_str(&format!("\t{}", description));
    }
    println!("{}", line);
  }
}
