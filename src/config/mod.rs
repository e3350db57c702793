//! Configuration management for tagindex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`TAGINDEX_*`)
//! - Built-in defaults

mod settings;

pub use settings::Config;
