//! File system watcher using notify-rs.
//!
//! One named thread owns the OS subscription and the debounce buffer. It
//! multiplexes a stop signal, raw events and a ticker; each quiescence flush
//! dispatches the batch to the [`Handler`] and pushes one snapshot to the
//! differ.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;

use super::differ::ChangeSet;
use super::events::{Debouncer, RawEvent};
use super::handler::Handler;
use super::ordering::{default_ordering, EventOrdering};
use crate::config::{Config, DEFAULT_DEBOUNCE, DEFAULT_EVENT_BUFFER, DEFAULT_RATE};
use crate::error::WatcherError;
use crate::observability::spans;
use crate::{Error, Result};

/// Shortest tick period the run loop accepts.
const MIN_RATE: Duration = Duration::from_millis(1);

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Tick period of the run loop.
    pub rate: Duration,
    /// Quiet period required before a flush.
    pub debounce: Duration,
    /// Capacity of the inbound raw event channel.
    pub event_buffer: usize,
    pub ordering: Arc<dyn EventOrdering>,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            debounce: DEFAULT_DEBOUNCE,
            event_buffer: DEFAULT_EVENT_BUFFER,
            ordering: default_ordering(),
        }
    }
}

impl From<&Config> for WatcherOptions {
    fn from(config: &Config) -> Self {
        Self {
            rate: config.rate,
            debounce: config.debounce,
            event_buffer: config.event_buffer,
            ..Self::default()
        }
    }
}

/// Lifecycle of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Watcher statistics.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub raw_events: AtomicU64,
    pub dropped_events: AtomicU64,
    pub flushes: AtomicU64,
    pub events_dispatched: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            raw_events: self.raw_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub raw_events: u64,
    pub dropped_events: u64,
    pub flushes: u64,
    pub events_dispatched: u64,
    pub errors: u64,
}

/// Buffer and dispatch state owned by the watcher thread.
#[derive(Debug)]
struct RunLoop {
    handler: Arc<Handler>,
    debouncer: Debouncer,
    ordering: Arc<dyn EventOrdering>,
    stats: Arc<WatcherStats>,
}

impl RunLoop {
    fn new(handler: Arc<Handler>, options: &WatcherOptions, stats: Arc<WatcherStats>) -> Self {
        Self {
            handler,
            debouncer: Debouncer::new(options.debounce),
            ordering: Arc::clone(&options.ordering),
            stats,
        }
    }

    fn run(&mut self, raw_rx: &Receiver<RawEvent>, stop_rx: &Receiver<()>, rate: Duration) {
        let ticker = crossbeam_channel::tick(rate);

        loop {
            crossbeam_channel::select! {
                recv(stop_rx) -> _ => break,
                recv(raw_rx) -> raw => match raw {
                    Ok(raw) => self.debouncer.push(raw, Instant::now()),
                    Err(_) => break,
                },
                recv(ticker) -> tick => {
                    if let Ok(now) = tick {
                        self.tick(now);
                    }
                }
            }
        }
    }

    /// Flush the buffer if it has been quiet for the debounce window.
    fn tick(&mut self, now: Instant) -> Option<ChangeSet> {
        let mut batch = self.debouncer.poll(now)?;

        let span = spans::flush_span(batch.len());
        let _guard = span.enter();

        self.ordering.order(&mut batch);
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);

        for raw in &batch {
            match self.handler.handle_event(raw.to_event()) {
                Ok(()) => {
                    self.stats.events_dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        path = %raw.path.display(),
                        error = %e,
                        "failed to handle event"
                    );
                }
            }
        }

        Some(self.handler.update_differ())
    }
}

/// Recursive watcher over one root.
#[derive(Debug)]
pub struct Watcher {
    root: PathBuf,
    handler: Arc<Handler>,
    state: Arc<Mutex<WatcherState>>,
    stats: Arc<WatcherStats>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Subscribe to `root`, bootstrap `handler` and enter the run loop.
    ///
    /// Returns once the subscription is live and the base state is built.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory, the subscription
    /// fails, or the bootstrap walk fails.
    pub fn start(
        root: impl Into<PathBuf>,
        handler: Arc<Handler>,
        options: WatcherOptions,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        tracing::info!(path = %root.display(), "starting...");

        let state = Arc::new(Mutex::new(WatcherState::Starting));
        let stats = Arc::new(WatcherStats::default());
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let rate = options.rate.max(MIN_RATE);
        let mut run_loop = RunLoop::new(Arc::clone(&handler), &options, Arc::clone(&stats));
        let event_buffer = options.event_buffer.max(1);

        let thread = {
            let root = root.clone();
            let handler = Arc::clone(&handler);
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);

            std::thread::Builder::new()
                .name("treesync-watcher".to_string())
                .spawn(move || {
                    let (raw_tx, raw_rx) = crossbeam_channel::bounded(event_buffer);

                    let notifier = match subscribe(&root, raw_tx, stats) {
                        Ok(notifier) => notifier,
                        Err(e) => {
                            let _ = started_tx.send(Err(e));
                            return;
                        }
                    };

                    // Events arriving during the bootstrap walk wait in the channel.
                    if let Err(e) = handler.attach(&root) {
                        let _ = started_tx.send(Err(e));
                        return;
                    }

                    *state.lock() = WatcherState::Running;
                    let _ = started_tx.send(Ok(()));

                    run_loop.run(&raw_rx, &stop_rx, rate);

                    unsubscribe(notifier, &root);
                })?
        };

        let started = started_rx
            .recv()
            .map_err(|_| Error::internal("watcher thread exited before reporting start"))
            .and_then(|started| started);

        if let Err(e) = started {
            let _ = thread.join();
            *state.lock() = WatcherState::Stopped;
            return Err(e);
        }

        tracing::info!(path = %root.display(), "started");

        Ok(Self {
            root,
            handler,
            state,
            stats,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    #[must_use]
    pub fn state(&self) -> WatcherState {
        *self.state.lock()
    }

    #[must_use]
    pub fn stats(&self) -> WatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the run loop and wait for it to unsubscribe.
    ///
    /// A flush in progress completes first; no event is dispatched after
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::AlreadyStopped`] if the watcher was already
    /// shut down.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Err(WatcherError::AlreadyStopped.into());
        };

        *self.state.lock() = WatcherState::Stopping;
        tracing::info!(path = %self.root.display(), "stopping...");

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if thread.join().is_err() {
            tracing::error!("watcher thread panicked");
        }

        self.handler.detach();
        *self.state.lock() = WatcherState::Stopped;
        tracing::info!(path = %self.root.display(), "stopped.");

        Ok(())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}

/// Subscribe to `root` recursively, forwarding raw events to `raw_tx`.
fn subscribe(
    root: &Path,
    raw_tx: Sender<RawEvent>,
    stats: Arc<WatcherStats>,
) -> Result<RecommendedWatcher> {
    let watch_failed = |e: notify::Error| WatcherError::WatchFailed {
        path: root.display().to_string(),
        reason: e.to_string(),
    };

    let mut notifier = notify::recommended_watcher(
        move |result: std::result::Result<notify::Event, notify::Error>| match result {
            Ok(event) => {
                for raw in RawEvent::from_notify(&event) {
                    stats.raw_events.fetch_add(1, Ordering::Relaxed);
                    if let Err(TrySendError::Full(raw)) = raw_tx.try_send(raw) {
                        stats.dropped_events.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            path = %raw.path.display(),
                            "event buffer full; dropping event"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "watch error");
            }
        },
    )
    .map_err(watch_failed)?;

    notifier
        .watch(root, RecursiveMode::Recursive)
        .map_err(watch_failed)?;

    tracing::debug!(path = %root.display(), "subscribed");
    Ok(notifier)
}

fn unsubscribe(mut notifier: RecommendedWatcher, root: &Path) {
    if let Err(e) = notifier.unwatch(root) {
        tracing::debug!(path = %root.display(), error = %e, "unwatch failed");
    }
}
