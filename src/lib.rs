//! Treesync Library
//!
//! Change detection for a local directory tree: an ignore-aware snapshot of
//! the tree kept current from file system events, diffed after every quiet
//! period.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
