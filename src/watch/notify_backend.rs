// src/watch/notify_backend.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::WatchError;

use super::{RawEvent, WatchBackend, WatchTarget};

/// Per-directory subscription counts. One OS watch per directory, recursive
/// exactly while a tree subscription is alive.
#[derive(Debug, Default, Clone, Copy)]
struct DirWatch {
    flat: usize,
    tree: usize,
    recursive: bool,
}

impl DirWatch {
    fn total(&self) -> usize {
        self.flat + self.tree
    }
}

/// [`WatchBackend`] backed by `notify`'s recommended watcher.
///
/// Single files are watched through their parent directory because most
/// editors save by replacing the file, which drops a watch held on the inode.
pub struct NotifyBackend {
    watcher: Option<RecommendedWatcher>,
    dirs: HashMap<PathBuf, DirWatch>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("dirs", &self.dirs.len())
            .field("closed", &self.watcher.is_none())
            .finish()
    }
}

impl NotifyBackend {
    /// Start the OS watcher. Raw events are forwarded from notify's callback
    /// thread into the returned channel.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<RawEvent>), WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RawEvent>();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for raw in raw_events_from_notify(event) {
                        if event_tx.send(raw).is_err() {
                            // Receiver gone: the instance is shutting down.
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "file watch error, requesting rescan");
                    let _ = event_tx.send(RawEvent::Rescan);
                }
            },
            Config::default(),
        )
        .map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        info!("notify watcher started");

        Ok((
            Self {
                watcher: Some(watcher),
                dirs: HashMap::new(),
            },
            event_rx,
        ))
    }

    fn os_dir(target: &WatchTarget) -> (PathBuf, bool) {
        match target {
            WatchTarget::File(path) => (
                path.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
                false,
            ),
            WatchTarget::Dir(dir) => (dir.clone(), false),
            WatchTarget::Tree(dir) => (dir.clone(), true),
        }
    }

    fn subscribe(&mut self, dir: &Path, recursive: bool) -> Result<(), WatchError> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::Closed)?;
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(dir, mode)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!(?dir, recursive, "os watch added");
        Ok(())
    }

    fn os_unwatch(&mut self, dir: &Path) -> Result<(), WatchError> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };
        match watcher.unwatch(dir) {
            Ok(()) => {
                debug!(?dir, "os watch removed");
                Ok(())
            }
            // The directory itself was deleted; the OS already dropped it.
            Err(notify::Error {
                kind: notify::ErrorKind::WatchNotFound,
                ..
            }) => Ok(()),
            Err(e) => Err(WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    /// Mode of the OS watch currently held on `dir`, if any.
    pub fn watch_mode(&self, dir: &Path) -> Option<RecursiveMode> {
        self.dirs.get(dir).map(|slot| {
            if slot.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            }
        })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let (dir, tree) = Self::os_dir(target);
        let current = self.dirs.get(&dir).copied().unwrap_or_default();

        if current.total() == 0 || (tree && !current.recursive) {
            self.subscribe(&dir, tree || current.recursive)?;
        }

        let slot = self.dirs.entry(dir).or_default();
        slot.recursive |= tree;
        if tree {
            slot.tree += 1;
        } else {
            slot.flat += 1;
        }
        Ok(())
    }

    fn unwatch(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let (dir, tree) = Self::os_dir(target);
        let Some(slot) = self.dirs.get_mut(&dir) else {
            return Ok(());
        };
        if tree {
            slot.tree = slot.tree.saturating_sub(1);
        } else {
            slot.flat = slot.flat.saturating_sub(1);
        }
        if slot.tree == 0 && slot.flat > 0 && slot.recursive {
            slot.recursive = false;
            self.os_unwatch(&dir)?;
            self.subscribe(&dir, false)?;
            debug!(?dir, "os watch downgraded to non-recursive");
            return Ok(());
        }
        if slot.total() > 0 {
            return Ok(());
        }

        self.dirs.remove(&dir);
        self.os_unwatch(&dir)
    }

    fn close(&mut self) -> Result<(), WatchError> {
        let Some(mut watcher) = self.watcher.take() else {
            return Ok(());
        };
        for dir in std::mem::take(&mut self.dirs).into_keys() {
            if let Err(err) = watcher.unwatch(&dir) {
                debug!(?dir, error = %err, "ignoring unwatch failure during close");
            }
        }
        drop(watcher);
        info!("notify watcher closed");
        Ok(())
    }
}

/// Map one notify event onto raw events. Access and metadata-only events
/// are ignored, except `Metadata(Any)`, which some backends report instead
/// of a content modification.
pub fn raw_events_from_notify(event: Event) -> Vec<RawEvent> {
    if event.need_rescan() {
        return vec![RawEvent::Rescan];
    }

    let paths = event.paths;
    match event.kind {
        EventKind::Create(_) => paths.into_iter().map(RawEvent::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(RawEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)) => {
            paths.into_iter().map(RawEvent::Modified).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match &paths[..] {
            [from, to, ..] => vec![RawEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => paths.into_iter().map(RawEvent::Moved).collect(),
        },
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any => {
            paths.into_iter().map(RawEvent::Moved).collect()
        }
        EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Other)
        | EventKind::Access(_)
        | EventKind::Other => Vec::new(),
    }
}
