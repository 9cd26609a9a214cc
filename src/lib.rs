//! Thumbcache - a two-tier thumbnail cache.
//!
//! This crate fetches remote images, crops them to square thumbnails and keeps
//! them in a bounded LRU memory cache backed by a content-addressed disk cache.
//! Network fetches are capped and queued, and results reach UI slots only
//! through weak handles.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the cache and its adapters.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "thumbcache";
