//! Authoritative tree state and event handling.
//!
//! The handler owns the live path -> File map and the live ruleset map for
//! the whole watched root. Each event re-walks only the affected sub-tree and
//! merges the result under a single lock.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::differ::{ChangeSet, Differ};
use super::events::{Event, Operation};
use super::file::{File, FileMap};
use super::filter::{scan, Scan};
use super::walker::{RulesetMap, Walker, GITIGNORE};
use crate::error::{HandlerError, WalkError};
use crate::observability::spans;
use crate::{Error, Result};

/// How a fresh sub-tree is folded into the authoritative maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Insert or overwrite; never remove.
    Created,
    /// Insert or overwrite, then drop entries under the sub-tree root that
    /// the fresh walk no longer has.
    Modified,
    /// Drop everything under the fresh paths.
    Deleted,
}

/// What one merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files: usize,
    pub folders: usize,
    pub rulesets: usize,
    pub removed: usize,
}

/// Paths of `paths` that have no ancestor (or equal) in the set.
#[must_use]
pub fn minimal_prefixes<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut sorted: Vec<&PathBuf> = paths.into_iter().collect();
    // Component-wise ordering keeps every path right after its ancestors.
    sorted.sort();

    let mut prefixes: Vec<PathBuf> = Vec::new();
    for path in sorted {
        if !prefixes.last().is_some_and(|last| path.starts_with(last)) {
            prefixes.push(path.clone());
        }
    }
    prefixes
}

fn merge_scope(kind: MergeKind, fresh: &FileMap) -> Vec<PathBuf> {
    match kind {
        MergeKind::Created => Vec::new(),
        MergeKind::Modified => fresh
            .keys()
            .min_by_key(|path| path.as_os_str().len())
            .cloned()
            .into_iter()
            .collect(),
        MergeKind::Deleted => minimal_prefixes(fresh.keys()),
    }
}

fn merge<V: Clone>(
    authoritative: &mut HashMap<PathBuf, V>,
    kind: MergeKind,
    fresh: &HashMap<PathBuf, V>,
    scope: &[PathBuf],
) -> usize {
    let in_scope = |path: &Path| scope.iter().any(|prefix| path.starts_with(prefix));

    if kind != MergeKind::Deleted {
        authoritative.extend(fresh.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let before = authoritative.len();
    match kind {
        MergeKind::Created => {}
        MergeKind::Modified => {
            authoritative.retain(|path, _| !in_scope(path.as_path()) || fresh.contains_key(path));
        }
        MergeKind::Deleted => authoritative.retain(|path, _| !in_scope(path.as_path())),
    }
    before - authoritative.len()
}

/// Fold `fresh` into `authoritative`; returns how many entries were removed.
pub fn merge_files(authoritative: &mut FileMap, kind: MergeKind, fresh: &FileMap) -> usize {
    merge(authoritative, kind, fresh, &merge_scope(kind, fresh))
}

#[derive(Debug, Default)]
struct HandlerState {
    file_by_path: FileMap,
    git_ignore_by_path: RulesetMap,
    /// Root of the attached watcher, if any.
    watcher: Option<PathBuf>,
}

/// Keeps the authoritative snapshot of the watched tree.
#[derive(Debug)]
pub struct Handler {
    root: PathBuf,
    walker: Walker,
    differ: Arc<Differ>,
    changes_tx: Option<mpsc::UnboundedSender<ChangeSet>>,
    state: Mutex<HandlerState>,
}

impl Handler {
    /// Create a handler for the tree at `root` (expected absolute).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, walker: Walker, differ: Arc<Differ>) -> Self {
        Self {
            root: root.into(),
            walker,
            differ,
            changes_tx: None,
            state: Mutex::new(HandlerState::default()),
        }
    }

    /// Forward every accepted diff to `changes_tx`.
    #[must_use]
    pub fn with_changes(mut self, changes_tx: mpsc::UnboundedSender<ChangeSet>) -> Self {
        self.changes_tx = Some(changes_tx);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn differ(&self) -> &Arc<Differ> {
        &self.differ
    }

    /// Attach a watcher and build the base state.
    ///
    /// Walks the whole root as a created merge and pushes the result to the
    /// differ before any live event is handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial walk fails; the watcher stays detached.
    pub fn attach(&self, watcher_root: &Path) -> Result<()> {
        self.state.lock().watcher = Some(watcher_root.to_path_buf());

        tracing::info!(path = %self.root.display(), "walking to build base state");
        if let Err(e) = self.add(&self.root) {
            self.detach();
            return Err(e);
        }

        self.update_differ();
        Ok(())
    }

    /// Forget the attached watcher.
    pub fn detach(&self) {
        self.state.lock().watcher = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.lock().watcher.is_some()
    }

    /// Apply one event to the authoritative maps.
    ///
    /// A re-walk that fails because the path vanished is not an error: the
    /// event is simply dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if no watcher is attached or the path cannot be
    /// made absolute.
    pub fn handle_event(&self, mut event: Event) -> Result<()> {
        event.normalize()?;

        if !self.is_attached() {
            return Err(HandlerError::WatcherNotAttached {
                path: event.path.display().to_string(),
            }
            .into());
        }

        tracing::debug!(operation = %event.operation, path = %event.path.display(), "event");

        let outcome = match event.operation {
            Operation::Created => self.add(&event.path).map(drop),
            Operation::Deleted => {
                self.remove(&event.path);
                self.forget_gitignore(&event)
            }
            Operation::Modified => self.refresh(self.modified_target(&event)).map(drop),
            Operation::Moved if event.parent_path.starts_with(&self.root) => {
                self.refresh(&event.parent_path).map(drop)
            }
            Operation::Moved | Operation::Unknown => Ok(()),
        };

        match outcome {
            Ok(()) => {}
            Err(Error::Walk(WalkError::Traversal { path, reason })) => {
                tracing::debug!(%path, %reason, "re-walk failed; nothing to report");
            }
            Err(e) => {
                tracing::warn!(path = %event.path.display(), error = %e, "dropping event");
            }
        }

        Ok(())
    }

    /// Re-walk `path` and insert everything found.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk fails.
    pub fn add(&self, path: &Path) -> Result<MergeStats> {
        let span = spans::rewalk_span("created", path);
        let _guard = span.enter();
        let started = Instant::now();

        let scan = self.rewalk(path)?;
        let stats = self.apply(MergeKind::Created, &scan);

        log_merge("add", path, &stats, started);
        Ok(stats)
    }

    /// Remove `path` and everything beneath it.
    ///
    /// If `path` can no longer be walked it is treated as a folder so that
    /// prefix removal still applies.
    pub fn remove(&self, path: &Path) -> MergeStats {
        let span = spans::rewalk_span("deleted", path);
        let _guard = span.enter();
        let started = Instant::now();

        let mut scan = self.rewalk(path).unwrap_or_else(|e| {
            tracing::trace!(path = %path.display(), error = %e, "re-walk failed; assuming folder");
            Scan::default()
        });
        scan.files
            .entry(path.to_path_buf())
            .or_insert_with(|| File::synthetic_folder(path));

        let stats = self.apply(MergeKind::Deleted, &scan);

        log_merge("remove", path, &stats, started);
        stats
    }

    /// Replace the sub-tree at `path` with a fresh walk of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk produced inconsistent output.
    pub fn refresh(&self, path: &Path) -> Result<MergeStats> {
        let span = spans::rewalk_span("modified", path);
        let _guard = span.enter();
        let started = Instant::now();

        let stats = match self.rewalk(path) {
            Ok(scan) => self.apply(MergeKind::Modified, &scan),
            Err(Error::Walk(WalkError::Traversal { .. })) => return Ok(self.remove(path)),
            Err(e) => return Err(e),
        };

        log_merge("update", path, &stats, started);
        Ok(stats)
    }

    /// Push the current snapshot to the differ and diff it.
    ///
    /// The change set is forwarded only when the differ accepted a new
    /// snapshot.
    pub fn update_differ(&self) -> ChangeSet {
        let snapshot = self.state.lock().file_by_path.clone();

        let accepted = self.differ.update(snapshot);
        let changes = self.differ.diff();

        if accepted {
            if let Some(tx) = &self.changes_tx {
                if tx.send(changes.clone()).is_err() {
                    tracing::debug!("change receiver dropped");
                }
            }
        }

        changes
    }

    /// Copy of the authoritative file map.
    #[must_use]
    pub fn snapshot(&self) -> FileMap {
        self.state.lock().file_by_path.clone()
    }

    /// Copy of the authoritative ruleset map.
    #[must_use]
    pub fn rulesets(&self) -> RulesetMap {
        self.state.lock().git_ignore_by_path.clone()
    }

    /// Drop the ruleset of a deleted `.gitignore` and re-walk its directory,
    /// so files it was hiding come back.
    fn forget_gitignore(&self, event: &Event) -> Result<()> {
        if event.path.file_name() != Some(OsStr::new(GITIGNORE)) {
            return Ok(());
        }

        let forgotten = self
            .state
            .lock()
            .git_ignore_by_path
            .remove(&event.parent_path)
            .is_some();
        if forgotten {
            tracing::debug!(path = %event.parent_path.display(), "gitignore removed");
        }

        if event.parent_path.starts_with(&self.root) {
            self.refresh(&event.parent_path)?;
        }
        Ok(())
    }

    /// Modified events re-walk the parent, unless it lies outside the root.
    fn modified_target<'a>(&self, event: &'a Event) -> &'a Path {
        if event.parent_path.starts_with(&self.root) {
            &event.parent_path
        } else {
            &event.path
        }
    }

    /// Walk and filter `path` with every ruleset that applies to it.
    ///
    /// Known rulesets inside `path` are left out; the walk finds current ones.
    fn rewalk(&self, path: &Path) -> Result<Scan> {
        let known: RulesetMap = self
            .state
            .lock()
            .git_ignore_by_path
            .iter()
            .filter(|(dir, _)| !dir.starts_with(path))
            .map(|(dir, ruleset)| (dir.clone(), ruleset.clone()))
            .collect();

        scan(&self.walker, path, &known)
    }

    fn apply(&self, kind: MergeKind, scan: &Scan) -> MergeStats {
        let scope = merge_scope(kind, &scan.files);

        let mut state = self.state.lock();
        merge(&mut state.git_ignore_by_path, kind, &scan.rulesets, &scope);
        let removed = merge(&mut state.file_by_path, kind, &scan.files, &scope);

        MergeStats {
            files: scan.files.len(),
            folders: scan.folders.len(),
            rulesets: scan.rulesets.len(),
            removed,
        }
    }
}

fn log_merge(operation: &str, path: &Path, stats: &MergeStats, started: Instant) {
    if stats.files <= 1 && stats.folders == 0 {
        return;
    }

    tracing::debug!(
        operation,
        path = %path.display(),
        files = stats.files,
        folders = stats.folders,
        gitignores = stats.rulesets,
        removed = stats.removed,
        elapsed = ?started.elapsed(),
        "walked"
    );
}
