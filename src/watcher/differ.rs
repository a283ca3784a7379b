//! Snapshot differ.
//!
//! Holds the last two accepted snapshots of the watched tree and classifies
//! every path as added, removed or modified between them.

use parking_lot::Mutex;
use serde::Serialize;

use super::file::{sorted_files, FileMap};

/// Changes between two snapshots. The three maps are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: FileMap,
    pub removed: FileMap,
    pub modified: FileMap,
}

/// Per-kind counts of a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub added_files: usize,
    pub removed_files: usize,
    pub modified_files: usize,
    pub added_folders: usize,
    pub removed_folders: usize,
    pub modified_folders: usize,
}

impl ChangeSet {
    /// Check if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of changed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Count changes, splitting files from folders.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        let split = |map: &FileMap| {
            let folders = map.values().filter(|f| f.is_dir).count();
            (map.len() - folders, folders)
        };

        let (added_files, added_folders) = split(&self.added);
        let (removed_files, removed_folders) = split(&self.removed);
        let (modified_files, modified_folders) = split(&self.modified);

        ChangeSummary {
            added_files,
            removed_files,
            modified_files,
            added_folders,
            removed_folders,
            modified_folders,
        }
    }
}

/// Compare two snapshots.
///
/// Present in `current` only: added. Present in both with a different size or
/// modification time: modified. Present in `previous` only: removed.
#[must_use]
pub fn diff_snapshots(previous: &FileMap, current: &FileMap) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, file) in current {
        match previous.get(path) {
            Some(last) if file.is_unchanged_from(last) => {}
            Some(_) => {
                changes.modified.insert(path.clone(), file.clone());
            }
            None => {
                changes.added.insert(path.clone(), file.clone());
            }
        }
    }

    for (path, last) in previous {
        if !current.contains_key(path) {
            changes.removed.insert(path.clone(), last.clone());
        }
    }

    changes
}

#[derive(Debug, Default)]
struct Snapshots {
    current: FileMap,
    previous: FileMap,
}

/// Keeps the current and previous snapshots consistent under one lock.
#[derive(Debug, Default)]
pub struct Differ {
    snapshots: Mutex<Snapshots>,
}

impl Differ {
    /// Create a differ with two empty snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `snapshot` as the new current state.
    ///
    /// Returns `false`, leaving both snapshots untouched, when `snapshot`
    /// equals the current one.
    pub fn update(&self, snapshot: FileMap) -> bool {
        let mut snapshots = self.snapshots.lock();

        if snapshot == snapshots.current {
            tracing::debug!(files = snapshot.len(), "differ update ignored; no changes");
            return false;
        }

        snapshots.previous = std::mem::replace(&mut snapshots.current, snapshot);

        tracing::debug!(
            files = snapshots.current.len(),
            last_files = snapshots.previous.len(),
            "differ update honoured"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            for file in sorted_files(&snapshots.current) {
                tracing::trace!(path = %file.path.display(), "differ state");
            }
        }

        true
    }

    /// Diff the previous snapshot against the current one.
    pub fn diff(&self) -> ChangeSet {
        let changes = {
            let snapshots = self.snapshots.lock();
            diff_snapshots(&snapshots.previous, &snapshots.current)
        };

        for (kind, map) in [
            ("added", &changes.added),
            ("removed", &changes.removed),
            ("modified", &changes.modified),
        ] {
            for file in sorted_files(map) {
                tracing::debug!(kind, path = %file.path.display(), "differ");
            }
        }

        let summary = changes.summary();
        tracing::info!(
            added_files = summary.added_files,
            removed_files = summary.removed_files,
            modified_files = summary.modified_files,
            added_folders = summary.added_folders,
            removed_folders = summary.removed_folders,
            modified_folders = summary.modified_folders,
            "diff"
        );

        changes
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn current(&self) -> FileMap {
        self.snapshots.lock().current.clone()
    }

    /// Copy of the previous snapshot.
    #[must_use]
    pub fn previous(&self) -> FileMap {
        self.snapshots.lock().previous.clone()
    }
}
