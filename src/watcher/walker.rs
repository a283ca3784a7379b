//! Concurrent directory walker.
//!
//! Walks a tree with the `ignore` crate's parallel walker, pruning statically
//! ignored paths as it goes and compiling every `.gitignore` it meets on its
//! own scoped thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};
use parking_lot::Mutex;

use super::file::File;
use super::ignore_rules::StaticIgnore;
use crate::error::WalkError;
use crate::Result;

/// File name of per-directory ignore rules.
pub const GITIGNORE: &str = ".gitignore";

/// Compiled `.gitignore` rules, shared between maps.
pub type Ruleset = Arc<Gitignore>;

/// Rulesets keyed by the directory containing their `.gitignore`.
pub type RulesetMap = HashMap<PathBuf, Ruleset>;

/// Walk statistics.
#[derive(Debug, Default)]
pub struct WalkStats {
    pub visited: AtomicU64,
    pub pruned: AtomicU64,
    pub stat_fallbacks: AtomicU64,
    pub gitignores: AtomicU64,
}

impl WalkStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WalkStatsSnapshot {
        WalkStatsSnapshot {
            visited: self.visited.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            stat_fallbacks: self.stat_fallbacks.load(Ordering::Relaxed),
            gitignores: self.gitignores.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of walk stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStatsSnapshot {
    pub visited: u64,
    pub pruned: u64,
    pub stat_fallbacks: u64,
    pub gitignores: u64,
}

/// Output of one walk.
#[derive(Debug, Default)]
pub struct Walk {
    /// Every path that survived the static ignore patterns, in no particular order.
    pub files: Vec<File>,
    /// Rulesets compiled from `.gitignore` files met during the walk.
    pub rulesets: RulesetMap,
    pub stats: WalkStatsSnapshot,
}

/// Concurrent tree walker.
#[derive(Debug, Clone)]
pub struct Walker {
    ignore: Arc<StaticIgnore>,
    threads: usize,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(StaticIgnore::none())
    }
}

impl Walker {
    /// Create a walker that prunes paths matching `ignore`.
    #[must_use]
    pub fn new(ignore: StaticIgnore) -> Self {
        Self {
            ignore: Arc::new(ignore),
            threads: 0,
        }
    }

    /// Set the number of traversal threads (0 lets the walker decide).
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Walk the tree rooted at `root`.
    ///
    /// A failed stat on one entry yields a record without info; any error
    /// from the traversal itself aborts the walk.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::Traversal`] if the traversal fails, including when
    /// `root` does not exist.
    pub fn walk(&self, root: &Path) -> Result<Walk> {
        let started = Instant::now();

        let files = Mutex::new(Vec::new());
        let rulesets = Mutex::new(RulesetMap::new());
        let failure: Mutex<Option<WalkError>> = Mutex::new(None);
        let stats = WalkStats::default();

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .threads(self.threads)
            .build_parallel();

        std::thread::scope(|scope| {
            let files = &files;
            let rulesets = &rulesets;
            let failure = &failure;
            let stats = &stats;
            let ignore = &*self.ignore;

            walker.run(move || {
                Box::new(
                    move |entry: std::result::Result<DirEntry, ignore::Error>| {
                        let entry = match entry {
                            Ok(entry) => entry,
                            Err(e) => {
                                failure
                                    .lock()
                                    .get_or_insert_with(|| {
                                        WalkError::traversal(error_path(&e).unwrap_or(root), &e)
                                    });
                                return WalkState::Quit;
                            }
                        };

                        stats.visited.fetch_add(1, Ordering::Relaxed);

                        // Skipping a directory here prunes its whole sub-tree.
                        if ignore.is_ignored(entry.path()) {
                            stats.pruned.fetch_add(1, Ordering::Relaxed);
                            return WalkState::Skip;
                        }

                        let file = match entry.metadata() {
                            Ok(metadata) => File::from_metadata(entry.path(), &metadata),
                            Err(e) => {
                                stats.stat_fallbacks.fetch_add(1, Ordering::Relaxed);
                                tracing::debug!(
                                    path = %entry.path().display(),
                                    error = %e,
                                    "stat failed during walk"
                                );
                                File::without_info(entry.path())
                            }
                        };

                        if !file.is_dir && file.name == GITIGNORE {
                            let path = file.path.clone();
                            let parent = file.parent_path.clone();
                            scope.spawn(move || match compile_gitignore(&path) {
                                Ok(gitignore) => {
                                    stats.gitignores.fetch_add(1, Ordering::Relaxed);
                                    rulesets.lock().insert(parent, Arc::new(gitignore));
                                }
                                Err(e) => tracing::warn!(error = %e, "skipping gitignore"),
                            });
                        }

                        files.lock().push(file);
                        WalkState::Continue
                    },
                )
            });
        });

        if let Some(err) = failure.into_inner() {
            return Err(err.into());
        }

        let walk = Walk {
            files: files.into_inner(),
            rulesets: rulesets.into_inner(),
            stats: stats.snapshot(),
        };

        tracing::trace!(
            path = %root.display(),
            files = walk.files.len(),
            gitignores = walk.rulesets.len(),
            pruned = walk.stats.pruned,
            elapsed = ?started.elapsed(),
            "walk complete"
        );

        Ok(walk)
    }
}

/// The entry a traversal error refers to, if it names one.
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

/// Compile one `.gitignore` file, rooted at its parent directory.
///
/// Malformed lines are skipped with a warning; only an unreadable file fails.
///
/// # Errors
///
/// Returns [`WalkError::GitIgnore`] if the file cannot be read or the
/// resulting matcher cannot be built.
pub fn compile_gitignore(path: &Path) -> std::result::Result<Gitignore, WalkError> {
    let root = path.parent().unwrap_or_else(|| Path::new("/"));
    let mut builder = GitignoreBuilder::new(root);

    if let Some(err) = builder.add(path) {
        if err.is_io() {
            return Err(WalkError::GitIgnore {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
        tracing::warn!(path = %path.display(), error = %err, "ignoring malformed gitignore lines");
    }

    builder.build().map_err(|e| WalkError::GitIgnore {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
