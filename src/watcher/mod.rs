//! File system watching and change detection.
//!
//! This module provides:
//! - A concurrent, ignore-aware tree walker
//! - Gitignore filtering scoped to each `.gitignore`'s directory
//! - An authoritative snapshot kept current by sub-tree re-walks
//! - A debounced watcher that diffs snapshots after each quiet period

mod differ;
mod events;
mod file;
mod filter;
mod handler;
mod ignore_rules;
mod ordering;
pub mod session;
mod walker;
#[allow(clippy::module_inception)]
mod watcher;

pub use differ::{diff_snapshots, ChangeSet, ChangeSummary, Differ};
pub use events::{absolutize, Debouncer, Event, Operation, RawEvent, RawKind};
pub use file::{sorted_files, ContentSum, File, FileMap, MODE_IRREGULAR};
pub use filter::{
    filter_directories_only, filter_ignored, index_by_path, is_git_ignored, scan, Scan,
};
pub use handler::{merge_files, minimal_prefixes, Handler, MergeKind, MergeStats};
pub use ignore_rules::StaticIgnore;
pub use ordering::{default_ordering, ArrivalOrder, EventOrdering, SequenceOrder};
pub use session::Session;
pub use walker::{
    compile_gitignore, Ruleset, RulesetMap, Walk, WalkStats, WalkStatsSnapshot, Walker, GITIGNORE,
};
pub use watcher::{Watcher, WatcherOptions, WatcherState, WatcherStats, WatcherStatsSnapshot};
