//! Gitignore filtering and snapshot indexing.

use std::path::Path;

use rayon::prelude::*;

use super::file::{File, FileMap};
use super::walker::{RulesetMap, Walker};
use crate::error::WalkError;
use crate::Result;

/// Whether any ruleset scoped to an ancestor of `file` ignores it.
///
/// Parent directories are checked too, so a pattern such as `build/`
/// covers everything beneath `build`.
#[must_use]
pub fn is_git_ignored(file: &File, rulesets: &RulesetMap) -> bool {
    rulesets.iter().any(|(dir, ruleset)| {
        file.path.starts_with(dir)
            && ruleset
                .matched_path_or_any_parents(&file.path, file.is_dir)
                .is_ignore()
    })
}

/// Drop every file matched by an applicable ruleset.
///
/// Files are evaluated in parallel; output order is not guaranteed.
#[must_use]
pub fn filter_ignored(files: Vec<File>, rulesets: &RulesetMap) -> Vec<File> {
    if rulesets.is_empty() {
        return files;
    }

    files
        .into_par_iter()
        .filter(|file| !is_git_ignored(file, rulesets))
        .collect()
}

/// Select directories.
#[must_use]
pub fn filter_directories_only(files: &[File]) -> Vec<File> {
    files.iter().filter(|f| f.is_dir).cloned().collect()
}

/// Build a snapshot map keyed by path.
///
/// # Errors
///
/// Returns [`WalkError::DuplicatePath`] if a path appears twice.
pub fn index_by_path(files: Vec<File>) -> Result<FileMap> {
    let mut file_by_path = FileMap::with_capacity(files.len());

    for file in files {
        if file_by_path.contains_key(&file.path) {
            return Err(WalkError::DuplicatePath {
                path: file.path.display().to_string(),
            }
            .into());
        }
        file_by_path.insert(file.path.clone(), file);
    }

    Ok(file_by_path)
}

/// Filtered, indexed view of one sub-tree.
#[derive(Debug, Default)]
pub struct Scan {
    pub files: FileMap,
    pub folders: FileMap,
    /// Rulesets found inside the sub-tree.
    pub rulesets: RulesetMap,
}

/// Walk `path`, filter with the fresh rulesets plus `known`, and index.
///
/// `known` carries rulesets from outside the sub-tree that still apply to
/// it; fresh rulesets win when both have the same key.
///
/// # Errors
///
/// Returns an error if the walk fails or produces a duplicate path.
pub fn scan(walker: &Walker, path: &Path, known: &RulesetMap) -> Result<Scan> {
    let walk = walker.walk(path)?;

    let files = if known.is_empty() {
        filter_ignored(walk.files, &walk.rulesets)
    } else {
        let mut effective = known.clone();
        effective.extend(
            walk.rulesets
                .iter()
                .map(|(dir, ruleset)| (dir.clone(), ruleset.clone())),
        );
        filter_ignored(walk.files, &effective)
    };

    let folders = index_by_path(filter_directories_only(&files))?;
    let files = index_by_path(files)?;

    Ok(Scan {
        files,
        folders,
        rulesets: walk.rulesets,
    })
}
