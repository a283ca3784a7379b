//! Configuration management for Treesync.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, IgnoreConfig, DEFAULT_DEBOUNCE, DEFAULT_EVENT_BUFFER, DEFAULT_RATE};
