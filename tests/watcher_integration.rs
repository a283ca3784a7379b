//! Integration tests for the watcher against the real OS notifier.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use treesync::watcher::{session, ChangeSet, FileMap, Session};
use treesync::Config;

/// Generous upper bound for one flush to reach the test.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

fn config(root: &std::path::Path) -> Config {
    Config {
        rate: Duration::from_millis(10),
        debounce: Duration::from_millis(50),
        ..Config::new(root)
    }
}

fn files_only(map: &FileMap) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = map
        .values()
        .filter(|f| !f.is_dir)
        .map(|f| f.path.clone())
        .collect();
    paths.sort();
    paths
}

/// Wait for the next change set that touches a non-directory path.
///
/// Directory entries change alongside their children (mtime), so they are
/// left out of the comparison.
async fn next_file_changes(session: &mut Session) -> ChangeSet {
    loop {
        let changes = tokio::time::timeout(FLUSH_TIMEOUT, session.next_changes())
            .await
            .expect("timed out waiting for a flush")
            .expect("change channel closed");

        let touches_files = [&changes.added, &changes.removed, &changes.modified]
            .iter()
            .any(|map| map.values().any(|f| !f.is_dir));
        if touches_files {
            return changes;
        }
    }
}

/// Create, truncate and delete one file, checking each flush.
#[tokio::test]
async fn test_create_truncate_delete() {
    let tmp = TempDir::new().unwrap();
    let mut session = session::start(&config(tmp.path())).unwrap();
    let root = session.handler().root().to_path_buf();
    let file = root.join("a.txt");

    // Baseline holds only the empty root.
    let baseline = tokio::time::timeout(FLUSH_TIMEOUT, session.next_changes())
        .await
        .unwrap()
        .unwrap();
    assert!(files_only(&baseline.added).is_empty());
    assert!(baseline.added.contains_key(&root));

    fs::write(&file, "0123456789").unwrap();
    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.added), vec![file.clone()]);
    assert!(files_only(&changes.removed).is_empty());
    assert!(files_only(&changes.modified).is_empty());
    assert_eq!(changes.added[&file].size, 10);

    fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&file)
        .unwrap();
    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.modified), vec![file.clone()]);
    assert!(files_only(&changes.added).is_empty());
    assert!(files_only(&changes.removed).is_empty());
    assert_eq!(changes.modified[&file].size, 0);

    fs::remove_file(&file).unwrap();
    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.removed), vec![file.clone()]);
    assert!(files_only(&changes.added).is_empty());
    assert!(files_only(&changes.modified).is_empty());

    assert!(session.watcher_stats().flushes >= 3);
    session.stop().unwrap();
}

/// Paths under a statically ignored folder never show up.
#[tokio::test]
async fn test_ignored_folder_changes_are_invisible() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("node_modules")).unwrap();
    let mut session = session::start(&config(tmp.path())).unwrap();
    let root = session.handler().root().to_path_buf();

    fs::write(root.join("node_modules/pkg.js"), "x").unwrap();
    fs::write(root.join("kept.txt"), "x").unwrap();

    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.added), vec![root.join("kept.txt")]);
    assert!(!session
        .differ()
        .current()
        .keys()
        .any(|path| path.starts_with(root.join("node_modules"))));

    session.stop().unwrap();
}

/// A new `.gitignore` takes effect for files created after it.
#[tokio::test]
async fn test_gitignore_created_at_runtime() {
    let tmp = TempDir::new().unwrap();
    let mut session = session::start(&config(tmp.path())).unwrap();
    let root = session.handler().root().to_path_buf();

    fs::write(root.join(".gitignore"), "*.log\n").unwrap();
    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.added), vec![root.join(".gitignore")]);

    fs::write(root.join("debug.log"), "noise").unwrap();
    fs::write(root.join("notes.md"), "signal").unwrap();
    let changes = next_file_changes(&mut session).await;
    assert_eq!(files_only(&changes.added), vec![root.join("notes.md")]);

    session.stop().unwrap();
}

/// Starting on a missing root fails before anything is watched.
#[test]
fn test_start_missing_root_fails() {
    let tmp = TempDir::new().unwrap();
    let result = session::start(&Config::new(tmp.path().join("missing")));
    assert!(result.is_err());
}
