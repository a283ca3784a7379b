//! Point-in-time metadata records for filesystem paths.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Content digest slot. Never populated yet; always all zeroes.
pub type ContentSum = [u8; 16];

/// Snapshot map from absolute path to its record.
pub type FileMap = HashMap<PathBuf, File>;

/// Mode recorded when OS metadata was not available.
pub const MODE_IRREGULAR: u32 = 0o100_0000_0000;

/// Metadata snapshot of one filesystem path.
///
/// A record is built fresh on every walk and replaced, never mutated, when
/// the path is seen again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct File {
    /// Base name.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Directory containing `path`.
    pub parent_path: PathBuf,
    /// Whether OS metadata was obtained.
    pub has_info: bool,
    /// Size in bytes, 0 if unknown.
    pub size: u64,
    /// Modification time, or the time of observation if unknown.
    pub modified: DateTime<Utc>,
    /// Platform mode bits, or [`MODE_IRREGULAR`].
    pub mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub content_sum: ContentSum,
}

impl File {
    /// Build a record from metadata obtained without following symlinks.
    #[must_use]
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let path = path.into();
        let file_type = metadata.file_type();

        Self {
            name: name_of(&path),
            parent_path: parent_of(&path),
            has_info: true,
            size: metadata.len(),
            modified: metadata
                .modified()
                .map_or_else(|_| Utc::now(), DateTime::<Utc>::from),
            mode: mode_of(metadata),
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            content_sum: ContentSum::default(),
            path,
        }
    }

    /// Best-effort record for a path whose metadata could not be read.
    #[must_use]
    pub fn without_info(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        Self {
            name: name_of(&path),
            parent_path: parent_of(&path),
            has_info: false,
            size: 0,
            modified: Utc::now(),
            mode: MODE_IRREGULAR,
            is_dir: false,
            is_symlink: false,
            content_sum: ContentSum::default(),
            path,
        }
    }

    /// Stand-in directory entry for a path that is already gone.
    ///
    /// Used to drive prefix removal when a deleted path cannot be walked.
    #[must_use]
    pub fn synthetic_folder(path: impl Into<PathBuf>) -> Self {
        Self {
            has_info: true,
            is_dir: true,
            ..Self::without_info(path)
        }
    }

    /// Whether `other` describes the same content for diffing purposes.
    ///
    /// Only size and modification time are compared.
    #[must_use]
    pub fn is_unchanged_from(&self, other: &Self) -> bool {
        self.size == other.size && self.modified == other.modified
    }
}

/// Records of a map, sorted by path.
#[must_use]
pub fn sorted_files(file_by_path: &FileMap) -> Vec<&File> {
    let mut files: Vec<&File> = file_by_path.values().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}
