use clap::Parser;
use color_eyre::eyre::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use thumbcache::infrastructure::{CacheConfig, CliArgs, ConfigStore, DiskImageCache, ImageCache};

fn init_logging(config: &CacheConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<CacheConfig> {
    let store = ConfigStore::new()?;
    let mut config = store.load_config(args.config.as_deref())?;
    config.merge_with_args(args);

    init_logging(&config)?;

    // Environment sits between the file and the command line.
    config.merge_with_env();
    config.merge_with_args(args);
    Ok(config)
}

async fn run(args: CliArgs, config: CacheConfig) -> Result<()> {
    let disk = DiskImageCache::open(config.effective_cache_dir())?;
    let cache = ImageCache::with_http(config.loader_config(), disk)?;
    let _logger = cache.spawn_metrics_logger(config.metrics_interval());

    if args.urls.is_empty() {
        warn!("No URLs given");
    }

    if args.cached_only {
        for url in &args.urls {
            match cache.try_load_cached(url) {
                Some(image) => println!("{url}: cached {}x{}", image.width(), image.height()),
                None => println!("{url}: not cached"),
            }
        }
    } else if args.prefetch {
        for url in &args.urls {
            cache.prefetch(url);
        }
    } else {
        let mut loads = JoinSet::new();
        for url in args.urls {
            let cache = cache.clone();
            loads.spawn(async move {
                let result = cache.load(&url).await;
                (url, result)
            });
        }
        while let Some(joined) = loads.join_next().await {
            let (url, result) = joined?;
            match result {
                Ok(loaded) => println!(
                    "{url}: {}x{} from {}",
                    loaded.image.width(),
                    loaded.image.height(),
                    loaded.source
                ),
                Err(e) => println!("{url}: {e}"),
            }
        }
    }

    cache.wait_idle().await;

    let metrics = cache.metrics_snapshot();
    let status = cache.status();
    if args.json {
        let report = serde_json::json!({ "metrics": metrics, "status": status });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{metrics}");
        println!("{status}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    info!(version = thumbcache::VERSION, "Starting thumbcache");

    run(args, config).await
}
