//! File system event types and debouncing.

#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::EventKind;

use crate::error::HandlerError;

/// What happened to a path, as seen by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Created,
    Modified,
    Moved,
    Deleted,
    Unknown,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Moved => "moved",
            Self::Deleted => "deleted",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Normalized change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub operation: Operation,
    /// Path as reported by the notifier.
    pub name: PathBuf,
    /// Absolute form of `name`; empty until [`Event::normalize`] runs.
    pub path: PathBuf,
    pub parent_path: PathBuf,
}

impl Event {
    /// Create an event that has not been normalized yet.
    #[must_use]
    pub fn new(operation: Operation, name: impl Into<PathBuf>) -> Self {
        Self {
            operation,
            name: name.into(),
            path: PathBuf::new(),
            parent_path: PathBuf::new(),
        }
    }

    /// Fill in `path` and `parent_path` from `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory is needed and unavailable.
    pub fn normalize(&mut self) -> Result<(), HandlerError> {
        let path = absolutize(&self.name).map_err(|e| HandlerError::InvalidPath {
            path: self.name.display().to_string(),
            reason: e.to_string(),
        })?;

        self.parent_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.path = path;
        Ok(())
    }
}

/// Make `path` absolute and lexically clean (`.` and `..` resolved).
///
/// # Errors
///
/// Returns an error if `path` is relative and the current directory cannot
/// be read.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut clean = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    Ok(clean)
}

/// Kinds of raw notification the watcher subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Create,
    Remove,
    Write,
    Rename,
}

impl From<RawKind> for Operation {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Create => Self::Created,
            RawKind::Remove => Self::Deleted,
            RawKind::Write => Self::Modified,
            RawKind::Rename => Self::Moved,
        }
    }
}

impl RawKind {
    /// Map a notifier event kind, or `None` for kinds we do not watch.
    #[must_use]
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                Some(Self::Write)
            }
            _ => None,
        }
    }
}

/// One path from one notifier event, as buffered by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawKind,
    pub path: PathBuf,
    /// Monotonic id, on platforms that provide one.
    pub sequence: Option<u64>,
}

impl RawEvent {
    #[must_use]
    pub fn new(kind: RawKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            sequence: None,
        }
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Split a notifier event into one raw event per path.
    #[must_use]
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        RawKind::from_notify(&event.kind).map_or_else(Vec::new, |kind| {
            event
                .paths
                .iter()
                .map(|path| Self::new(kind, path.clone()))
                .collect()
        })
    }

    /// The handler-facing event for this notification.
    #[must_use]
    pub fn to_event(&self) -> Event {
        Event::new(self.kind.into(), self.path.clone())
    }
}

/// Buffer of raw events awaiting a quiet period.
#[derive(Debug)]
pub struct Debouncer {
    debounce: Duration,
    buffer: Vec<RawEvent>,
    last_event: Option<Instant>,
}

impl Debouncer {
    /// Create an empty buffer with the given quiescence window.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            buffer: Vec::new(),
            last_event: None,
        }
    }

    /// Buffer an event that arrived at `now`.
    pub fn push(&mut self, event: RawEvent, now: Instant) {
        tracing::trace!(kind = ?event.kind, path = %event.path.display(), "raw event");
        self.buffer.push(event);
        self.last_event = Some(now);
    }

    /// Take the whole buffer if nothing has arrived for the debounce window.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<RawEvent>> {
        if self.buffer.is_empty() {
            return None;
        }

        let last_event = self.last_event?;
        if now.saturating_duration_since(last_event) < self.debounce {
            return None;
        }

        Some(std::mem::take(&mut self.buffer))
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
