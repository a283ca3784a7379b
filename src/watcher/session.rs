//! Start/stop lifecycle for one watched tree.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::differ::{ChangeSet, Differ};
use super::handler::Handler;
use super::ignore_rules::StaticIgnore;
use super::walker::Walker;
use super::watcher::{Watcher, WatcherOptions, WatcherStatsSnapshot};
use crate::config::Config;
use crate::Result;

/// A running watch over one root.
///
/// Every accepted diff is queued and can be read with
/// [`Session::next_changes`]. Dropping the session stops the watcher.
#[derive(Debug)]
pub struct Session {
    watcher: Watcher,
    differ: Arc<Differ>,
    changes: mpsc::UnboundedReceiver<ChangeSet>,
}

/// Validate `config` and start watching its root.
///
/// Blocks for the bootstrap walk; call it from a blocking context when
/// running inside an async runtime.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the ignore patterns do
/// not compile, or the watcher fails to start.
pub fn start(config: &Config) -> Result<Session> {
    let config = config.clone().validated()?;

    let walker = Walker::new(StaticIgnore::new(&config.ignore)?);
    let differ = Arc::new(Differ::new());
    let (changes_tx, changes) = mpsc::unbounded_channel();
    let handler = Arc::new(
        Handler::new(&config.root, walker, Arc::clone(&differ)).with_changes(changes_tx),
    );

    let watcher = Watcher::start(&config.root, handler, WatcherOptions::from(&config))?;

    Ok(Session {
        watcher,
        differ,
        changes,
    })
}

impl Session {
    /// Wait for the next accepted change set.
    ///
    /// The first one is the bootstrap baseline, with every path added.
    /// Returns `None` once the watcher has stopped and the queue is drained.
    pub async fn next_changes(&mut self) -> Option<ChangeSet> {
        self.changes.recv().await
    }

    /// Take a queued change set without waiting.
    pub fn try_next_changes(&mut self) -> Option<ChangeSet> {
        self.changes.try_recv().ok()
    }

    #[must_use]
    pub fn differ(&self) -> &Arc<Differ> {
        &self.differ
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        self.watcher.handler()
    }

    #[must_use]
    pub fn watcher_stats(&self) -> WatcherStatsSnapshot {
        self.watcher.stats()
    }

    /// Stop watching and release the subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher was already stopped.
    pub fn stop(self) -> Result<()> {
        self.watcher.close()
    }
}
