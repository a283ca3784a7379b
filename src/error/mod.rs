//! Error types and Result aliases for Treesync.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Treesync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Treesync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tree walking error.
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Event handling error.
    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Walker and filter errors.
#[derive(Error, Debug)]
pub enum WalkError {
    /// The traversal itself failed (not a single entry's stat).
    #[error("failed to walk '{path}': {reason}")]
    Traversal { path: String, reason: String },

    /// The same absolute path was produced twice by one walk.
    #[error("duplicate path '{path}' in walk output")]
    DuplicatePath { path: String },

    /// A `.gitignore` file could not be compiled.
    #[error("failed to compile gitignore '{path}': {reason}")]
    GitIgnore { path: String, reason: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The run loop is no longer running.
    #[error("watcher already stopped")]
    AlreadyStopped,
}

/// Handler errors.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// An event arrived while no watcher was attached.
    #[error("watcher not attached, cannot handle event for '{path}'")]
    WatcherNotAttached { path: String },

    /// The event path could not be made absolute.
    #[error("invalid event path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl WalkError {
    /// Create a traversal error for `path`.
    pub fn traversal(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Traversal {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
