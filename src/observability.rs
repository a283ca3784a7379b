//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels (`RUST_LOG` takes precedence)
//! - Spans around re-walks and watcher flushes

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Initialize tracing with the given level and output format.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been initialized in this process.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!(
        "Tracing initialized: level={}, json={}",
        config.level,
        config.json
    );
}

/// Span helpers shared by the handler and the watcher.
pub mod spans {
    use std::path::Path;
    use tracing::{debug_span, Span};

    /// Span covering one sub-tree re-walk and merge.
    #[must_use]
    pub fn rewalk_span(operation: &str, path: &Path) -> Span {
        debug_span!(
            "rewalk",
            operation = %operation,
            path = %path.display(),
        )
    }

    /// Span covering one quiescence flush.
    #[must_use]
    pub fn flush_span(events: usize) -> Span {
        debug_span!("flush", events = events)
    }
}
