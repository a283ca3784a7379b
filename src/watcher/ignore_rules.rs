//! Built-in ignore patterns applied while walking.

use std::path::Path;

use regex::Regex;

use crate::config::IgnoreConfig;
use crate::{Error, Result};

/// Compiled static ignore patterns.
///
/// A path is ignored if any of its segments is one of the configured folder
/// names, or if it ends in one of the configured suffixes preceded by at
/// least one word character.
#[derive(Debug, Clone, Default)]
pub struct StaticIgnore {
    folders: Option<Regex>,
    suffixes: Option<Regex>,
}

impl StaticIgnore {
    /// Compile patterns from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new(config: &IgnoreConfig) -> Result<Self> {
        let folders = alternation(&config.folders)
            .map(|names| Regex::new(&format!(r"(?:^|[/\\])(?:{names})(?:[/\\]|$)")))
            .transpose()
            .map_err(|e| Error::config(format!("invalid folder ignore pattern: {e}")))?;

        let suffixes = alternation(&config.suffixes)
            .map(|suffixes| Regex::new(&format!(r"\w(?:{suffixes})$")))
            .transpose()
            .map_err(|e| Error::config(format!("invalid suffix ignore pattern: {e}")))?;

        Ok(Self { folders, suffixes })
    }

    /// Patterns that ignore nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether `path` matches either pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.folders.as_ref().is_some_and(|re| re.is_match(&path))
            || self.suffixes.as_ref().is_some_and(|re| re.is_match(&path))
    }
}

fn alternation(items: &[String]) -> Option<String> {
    let escaped: Vec<String> = items
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| regex::escape(s))
        .collect();

    if escaped.is_empty() {
        None
    } else {
        Some(escaped.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> StaticIgnore {
        StaticIgnore::new(&IgnoreConfig::default()).unwrap()
    }

    #[test]
    fn test_folder_pattern_matches_segment() {
        let ignore = defaults();
        for path in [
            "/node_modules",
            "/node_modules/",
            "/node_modules/something",
            "/node_modules/something/",
            "/something/node_modules",
            "/something/node_modules/",
            "/something/node_modules/something",
            "/something/node_modules/something/",
            "/project/.git/config",
        ] {
            assert!(ignore.is_ignored(Path::new(path)), "{path} should be ignored");
        }
    }

    #[test]
    fn test_folder_pattern_needs_whole_segment() {
        let ignore = defaults();
        assert!(!ignore.is_ignored(Path::new("/project/my_node_modules/a.js")));
        assert!(!ignore.is_ignored(Path::new("/project/.gitignore")));
        assert!(!ignore.is_ignored(Path::new("/project/venvs/a.py")));
        assert!(!ignore.is_ignored(Path::new("/project/src/main.rs")));
    }

    #[test]
    fn test_suffix_pattern() {
        let ignore = defaults();
        for path in ["some_file.pyc", "/some_file.pyc", "/something/some_file.pyc"] {
            assert!(ignore.is_ignored(Path::new(path)), "{path} should be ignored");
        }
        assert!(ignore.is_ignored(Path::new("/root/a.tmp")));
        // A bare suffix with no stem is not a match.
        assert!(!ignore.is_ignored(Path::new("/root/.tmp")));
        assert!(!ignore.is_ignored(Path::new("/root/a.pyc.txt")));
    }

    #[test]
    fn test_suffix_is_literal() {
        let config = IgnoreConfig {
            folders: vec![],
            suffixes: vec![".log".to_string()],
        };
        let ignore = StaticIgnore::new(&config).unwrap();
        assert!(ignore.is_ignored(Path::new("/root/app.log")));
        assert!(!ignore.is_ignored(Path::new("/root/appxlog")));
    }

    #[test]
    fn test_empty_config_ignores_nothing() {
        let ignore = StaticIgnore::new(&IgnoreConfig::empty()).unwrap();
        assert!(!ignore.is_ignored(Path::new("/root/node_modules/a.js")));
        assert!(!StaticIgnore::none().is_ignored(Path::new("/root/a.pyc")));
    }
}
