//! Application configuration.

pub mod args;
pub mod cache_config;
pub mod storage;

pub use args::CliArgs;
pub use cache_config::{CacheConfig, ENV_MEM_CAP, ENV_SIZE, LogLevel};
pub use storage::{ConfigError, ConfigStore};
