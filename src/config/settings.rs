//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default tick rate of the watcher run loop.
pub const DEFAULT_RATE: Duration = Duration::from_millis(100);

/// Default quiescence window before buffered events are flushed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Default capacity of the inbound raw event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 65_536;

/// Directory names pruned from every walk.
const DEFAULT_IGNORED_FOLDERS: &[&str] = &[
    ".pytest_cache",
    ".git",
    ".idea",
    "node_modules",
    ".teamcity",
    ".bash_history",
    ".venv",
    ".virtualenv",
    "venv",
    "coverage",
    "test_results",
];

/// File suffixes dropped from every walk.
const DEFAULT_IGNORED_SUFFIXES: &[&str] = &[".pyc", ".tmp"];

/// Static ignore lists applied while walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreConfig {
    /// Directory names; any path containing one as a segment is pruned.
    pub folders: Vec<String>,
    /// File name suffixes (including the leading dot).
    pub suffixes: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            folders: DEFAULT_IGNORED_FOLDERS.iter().map(|s| (*s).to_string()).collect(),
            suffixes: DEFAULT_IGNORED_SUFFIXES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl IgnoreConfig {
    /// Ignore nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            folders: Vec::new(),
            suffixes: Vec::new(),
        }
    }

    /// Append extra folders and suffixes to the lists, skipping duplicates.
    #[must_use]
    pub fn extend(mut self, folders: &[String], suffixes: &[String]) -> Self {
        for folder in folders {
            if !self.folders.contains(folder) {
                self.folders.push(folder.clone());
            }
        }
        for suffix in suffixes {
            if !self.suffixes.contains(suffix) {
                self.suffixes.push(suffix.clone());
            }
        }
        self
    }
}

/// Main configuration for a watch session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local directory to watch.
    pub root: PathBuf,

    /// How often the run loop checks for quiescence.
    pub rate: Duration,

    /// How long the tree must be quiet before a flush.
    pub debounce: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Capacity of the inbound raw event channel.
    pub event_buffer: usize,

    /// Static ignore lists.
    pub ignore: IgnoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            rate: DEFAULT_RATE,
            debounce: DEFAULT_DEBOUNCE,
            log_level: "info".to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for `root` with defaults for everything else.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values, canonicalizing the root in place.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&mut self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("root path must be set"));
        }

        let root = std::fs::canonicalize(&self.root).map_err(|e| {
            Error::config(format!(
                "root path '{}' cannot be resolved: {e}",
                self.root.display()
            ))
        })?;

        if !root.is_dir() {
            return Err(Error::config(format!(
                "root path '{}' is not a directory",
                root.display()
            )));
        }
        self.root = root;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.event_buffer == 0 {
            return Err(Error::config("event_buffer cannot be 0"));
        }

        if self.debounce <= self.rate {
            tracing::warn!(
                rate = ?self.rate,
                debounce = ?self.debounce,
                "debounce <= rate; every event will be handled on its own"
            );
        }

        Ok(())
    }

    /// Consume and return a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validated(mut self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate, Duration::from_millis(100));
        assert_eq!(config.debounce, Duration::from_millis(2000));
        assert_eq!(config.event_buffer, 65_536);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_validate_canonicalizes_root() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a");
        std::fs::create_dir(&nested).unwrap();

        let mut config = Config::new(nested.join("..").join("a"));
        config.validate().unwrap();

        assert!(config.root.is_absolute());
        assert_eq!(config.root, std::fs::canonicalize(&nested).unwrap());
    }

    #[test]
    fn test_validate_empty_root() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be set"));
    }

    #[test]
    fn test_validate_missing_root() {
        let mut config = Config::new("/nonexistent/treesync/root");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cannot be resolved"));
    }

    #[test]
    fn test_validate_root_not_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let mut config = Config::new(&file);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::new(tmp.path())
        };
        let err = config.validated().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Config::new(tmp.path())
            };
            assert!(
                config.validated().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }

    #[test]
    fn test_validate_zero_event_buffer() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            event_buffer: 0,
            ..Config::new(tmp.path())
        };
        let err = config.validated().unwrap_err();
        assert!(err.to_string().contains("event_buffer"));
    }

    #[test]
    fn test_debounce_not_above_rate_is_legal() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            rate: Duration::from_millis(100),
            debounce: Duration::from_millis(50),
            ..Config::new(tmp.path())
        };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_ignore_config_extend_skips_duplicates() {
        let ignore = IgnoreConfig::default().extend(
            &["node_modules".to_string(), "dist".to_string()],
            &[".log".to_string()],
        );
        assert_eq!(
            ignore.folders.iter().filter(|f| *f == "node_modules").count(),
            1
        );
        assert!(ignore.folders.contains(&"dist".to_string()));
        assert!(ignore.suffixes.contains(&".log".to_string()));
    }
}
