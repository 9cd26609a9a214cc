use super::cache_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "thumbcache",
    version,
    about = "Fetch, crop and cache image thumbnails",
    long_about = None
)]
pub struct CliArgs {
    /// Image URLs to resolve.
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum bitmaps kept in memory.
    #[arg(long)]
    pub mem_cap: Option<usize>,

    /// Thumbnail edge length in pixels.
    #[arg(long)]
    pub size: Option<u32>,

    /// Maximum simultaneous network fetches.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// HTTP request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Warm the caches instead of loading each URL.
    #[arg(long, conflicts_with = "cached_only")]
    pub prefetch: bool,

    /// Only consult the caches; never touch the network.
    #[arg(long)]
    pub cached_only: bool,

    /// Print the metrics snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}
