//! Cache configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::args::CliArgs;
use crate::infrastructure::image::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_DECODE_SIZE, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_METRICS_INTERVAL, DEFAULT_TIMEOUT_SECS, ImageCacheConfig, MAX_DECODE_SIZE,
    MIN_DECODE_SIZE, default_cache_dir,
};

pub(crate) const APP_NAME: &str = "thumbcache";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "thumbcache";

/// Environment variable overriding the memory capacity.
pub const ENV_MEM_CAP: &str = "THUMBCACHE_MEM_CAP";
/// Environment variable overriding the decode size.
pub const ENV_SIZE: &str = "THUMBCACHE_SIZE";

const MAX_ENV_MEM_CAP: usize = 100_000;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Settings for the cache and the binary around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Maximum bitmaps kept in memory.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Thumbnail edge length in pixels (32-512).
    #[serde(default = "default_decode_size")]
    pub decode_size: u32,

    /// Maximum simultaneous network fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Disk cache directory. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Seconds between status log lines.
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

const fn default_memory_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

const fn default_decode_size() -> u32 {
    DEFAULT_DECODE_SIZE
}

const fn default_max_concurrent_fetches() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_metrics_interval_secs() -> u64 {
    DEFAULT_METRICS_INTERVAL.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            memory_capacity: default_memory_capacity(),
            decode_size: default_decode_size(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            timeout_secs: default_timeout_secs(),
            cache_dir: None,
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Applies `THUMBCACHE_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) {
        self.merge_with_env_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides read through `lookup`. Out-of-range or
    /// unparsable values are logged and ignored.
    pub fn merge_with_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_MEM_CAP).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<usize>() {
                Ok(cap) if (1..MAX_ENV_MEM_CAP).contains(&cap) => {
                    info!(cap, "Using {ENV_MEM_CAP}");
                    self.memory_capacity = cap;
                }
                _ => warn!(value = %raw, "Invalid {ENV_MEM_CAP}, using default"),
            }
        }

        if let Some(raw) = lookup(ENV_SIZE).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u32>() {
                Ok(size) if (MIN_DECODE_SIZE..=MAX_DECODE_SIZE).contains(&size) => {
                    info!(size, "Using {ENV_SIZE}");
                    self.decode_size = size;
                }
                _ => warn!(
                    value = %raw,
                    "Invalid {ENV_SIZE} (must be {MIN_DECODE_SIZE}-{MAX_DECODE_SIZE}), using default"
                ),
            }
        }
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(cap) = args.mem_cap {
            self.memory_capacity = cap;
        }
        if let Some(size) = args.size {
            self.decode_size = size;
        }
        if let Some(max) = args.max_concurrent {
            self.max_concurrent_fetches = max;
        }
        if let Some(timeout) = args.timeout {
            self.timeout_secs = timeout;
        }
    }

    /// Settings handed to the cache facade.
    #[must_use]
    pub const fn loader_config(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            memory_capacity: self.memory_capacity,
            decode_size: self.decode_size,
            max_concurrent_fetches: self.max_concurrent_fetches,
            timeout_secs: self.timeout_secs,
        }
    }

    /// Interval for the status logger.
    #[must_use]
    pub const fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("thumbcache.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns effective disk cache directory.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}
