//! Change events fed into the scheduler.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// Filesystem and editor lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was created.
    Created(PathBuf),
    /// File content or metadata changed.
    Changed(PathBuf),
    /// File was deleted.
    Deleted(PathBuf),
    /// File was renamed from old path to new path.
    Renamed { from: PathBuf, to: PathBuf },
    /// Editor saved a document; `text` is its in-memory content.
    Saved { path: PathBuf, text: String },
    /// Editor switched to another document. Never mutates the index.
    ActiveChanged(PathBuf),
}

impl FileEvent {
    /// Get the primary path associated with this event.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Changed(p) | Self::Deleted(p) | Self::ActiveChanged(p) => p,
            Self::Saved { path, .. } => path,
            Self::Renamed { to, .. } => to,
        }
    }

    /// Map a raw notify event into index events.
    ///
    /// Access and other non-mutating kinds produce nothing.
    #[must_use]
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        use notify::event::{ModifyKind, RenameMode};
        use notify::EventKind;

        match event.kind {
            EventKind::Create(_) => event.paths.into_iter().map(Self::Created).collect(),
            EventKind::Remove(_) => event.paths.into_iter().map(Self::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let mut paths = event.paths.into_iter();
                match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => vec![Self::Renamed { from, to }],
                    _ => Vec::new(),
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .into_iter()
                .map(|p| if p.exists() { Self::Created(p) } else { Self::Deleted(p) })
                .collect(),
            EventKind::Modify(_) => event.paths.into_iter().map(Self::Changed).collect(),
            _ => Vec::new(),
        }
    }
}
