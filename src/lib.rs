//! tagindex library
//!
//! Incremental index of `TODO`/`FIXME`/`BUG`/`HACK`/`XXX` markers in a
//! source tree, kept current from filesystem or editor events and persisted
//! across restarts.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod storage;
pub mod tree;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
