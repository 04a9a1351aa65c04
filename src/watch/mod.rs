// src/watch/mod.rs

//! File watching and event classification.
//!
//! This module is responsible for:
//! - Owning exactly one logical watch handle per registered path
//!   ([`manager::WatchManager`]).
//! - Wiring up a cross-platform filesystem watcher (`notify`) behind the
//!   [`backend::WatchBackend`] trait, with an in-memory mock for tests.
//! - Turning raw `{path, kind}` notifications into [`FsChange`]s.
//!
//! It does **not** know about entries or owners; deciding who is affected by
//! a change is the propagation engine's job.

pub mod backend;
pub mod classify;
pub mod manager;
pub mod mock;
pub mod notify_backend;
pub mod path_utils;

use std::path::{Path, PathBuf};

pub use backend::WatchBackend;
pub use classify::classify;
pub use manager::{WatchHandle, WatchManager};
pub use mock::MockWatchBackend;
pub use notify_backend::{raw_events_from_notify, NotifyBackend};

/// What an underlying subscription observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchTarget {
    /// A single file (backends may implement this via its parent directory).
    File(PathBuf),
    /// Direct children of a directory.
    Dir(PathBuf),
    /// A directory and everything below it.
    Tree(PathBuf),
}

impl WatchTarget {
    pub fn path(&self) -> &Path {
        match self {
            WatchTarget::File(p) | WatchTarget::Dir(p) | WatchTarget::Tree(p) => p,
        }
    }
}

/// Raw notification as produced by a backend, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    /// One side of a rename whose direction the backend could not tell.
    Moved(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// The backend lost events; the whole entry set must be re-polled.
    Rescan,
}

/// Classified filesystem change for a single logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// Content of a watched path was modified.
    Changed(PathBuf),
    /// A path began existing.
    Appeared(PathBuf),
    /// A watched path stopped existing.
    Disappeared(PathBuf),
    /// Letter-case-only rename on a case-insensitive filesystem; the file's
    /// identity is unchanged.
    RenamedCaseOnly { from: PathBuf, to: PathBuf },
    /// Any other rename: the old path disappears and the new one is judged
    /// on its own.
    RenamedStructural { from: PathBuf, to: PathBuf },
}

impl FsChange {
    /// True when applying this change may need to read a freshly created file.
    pub fn is_appearance(&self) -> bool {
        matches!(
            self,
            FsChange::Appeared(_) | FsChange::RenamedStructural { .. }
        )
    }
}
