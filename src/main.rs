use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use vitrine::{
    CatalogPipeline, Category, Config, ConnectivityMonitor, FavoritesStore, FetchError, LoadState,
    RemoteCatalogFetcher,
};

/// Get the config directory path (~/.config/vitrine/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("vitrine"))
}

#[derive(Parser, Debug)]
#[command(name = "vitrine", about = "Browse a furniture catalog with offline favorites")]
struct Args {
    /// Category to browse
    #[arg(long, value_enum, default_value = "table")]
    category: Category,

    /// Free-text filter narrowing the category query
    #[arg(long, default_value = "")]
    search: String,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// List saved favorites and exit
    #[arg(long)]
    favorites: bool,

    /// Toggle the favorite status of a product id from the fetched results
    #[arg(long, value_name = "PRODUCT_ID")]
    toggle_favorite: Option<String>,

    /// Favorites database path (overrides config)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config_dir.join("favorites.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let store = FavoritesStore::open(db_path_str)
        .await
        .context("Failed to open favorites database")?;

    if args.favorites {
        let favorites = store.all().await;
        if favorites.is_empty() {
            println!("No favorites saved yet.");
        } else {
            for record in favorites {
                println!("★ {}  ({})", record.name, record.product_id);
            }
        }
        return Ok(());
    }

    // Env var takes precedence over the config file.
    let token = std::env::var("VITRINE_API_TOKEN")
        .ok()
        .or_else(|| config.api_token.clone());

    let mut fetcher = RemoteCatalogFetcher::new(reqwest::Client::new(), config.api_base_url.clone())
        .with_timeout(Duration::from_secs(config.request_timeout_secs));
    if let Some(token) = token {
        fetcher = fetcher.with_token(SecretString::from(token));
    } else {
        tracing::warn!("No API token configured; requests may be rejected");
    }

    let connectivity = ConnectivityMonitor::default();
    let pipeline = CatalogPipeline::spawn(Arc::new(fetcher), store, config.page_size);

    pipeline.set_category(args.category);
    pipeline.set_search_text(args.search.clone());
    // Covers the default (Table, "") query, which the setters above leave
    // untouched.
    pipeline.refresh();

    let mut refresh_state = pipeline.refresh_state();
    if let Err(err) = wait_for_phase(&mut refresh_state).await {
        if let Some(hint) = offline_hint(connectivity.is_online(), &err) {
            eprintln!("{}", hint);
        }
        anyhow::bail!("Search failed: {}", err);
    }

    let mut append_state = pipeline.append_state();
    for _ in 1..args.pages {
        pipeline.load_next_page();
        if let Err(err) = wait_for_phase(&mut append_state).await {
            if let Some(hint) = offline_hint(connectivity.is_online(), &err) {
                eprintln!("{}", hint);
            }
            eprintln!("Could not load more results: {}", err);
            break;
        }
    }

    if let Some(product_id) = &args.toggle_favorite {
        let mut items = pipeline.items();
        let known = items.borrow().iter().any(|i| i.product.id == *product_id);
        let was_favorite = items
            .borrow()
            .iter()
            .any(|i| i.product.id == *product_id && i.is_favorite);
        if !known {
            eprintln!("Product {} is not in the current results.", product_id);
        } else {
            pipeline.toggle_favorite(product_id.clone());
            // The store's watch drives the annotation flip; wait for it.
            let deadline = tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    items.changed().await.ok();
                    let flipped = items
                        .borrow()
                        .iter()
                        .any(|i| i.product.id == *product_id && i.is_favorite != was_favorite);
                    if flipped {
                        break;
                    }
                }
            })
            .await;
            if deadline.is_err() {
                eprintln!("Favorite change was not confirmed (storage unavailable?)");
            }
        }
    }

    let items = pipeline.items().borrow().clone();
    if items.is_empty() {
        println!("No results for {} \"{}\".", args.category, args.search);
        return Ok(());
    }

    println!("{} results for {} \"{}\":", items.len(), args.category, args.search);
    for item in &items {
        let marker = if item.is_favorite { "★" } else { " " };
        println!("{} {}  ({})", marker, item.product.name, item.product.id);
    }

    Ok(())
}

/// Wait for one fetch phase to settle; `Failed` becomes an error.
async fn wait_for_phase(rx: &mut watch::Receiver<LoadState>) -> Result<(), FetchError> {
    loop {
        {
            let state = rx.borrow_and_update();
            match &*state {
                LoadState::NotLoading => return Ok(()),
                LoadState::Failed(err) => return Err(err.clone()),
                LoadState::Idle | LoadState::Loading => {}
            }
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}

/// How to present `NetworkUnavailable`, given the platform connectivity
/// signal. The monitor is an input here, never written from fetch results.
fn offline_hint(online: bool, err: &FetchError) -> Option<&'static str> {
    if *err != FetchError::NetworkUnavailable {
        return None;
    }
    if online {
        Some("The catalog service could not be reached.")
    } else {
        Some("You appear to be offline.")
    }
}
