// src/watch/manager.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::errors::WatchError;
use crate::types::PathKey;

use super::{WatchBackend, WatchTarget};

/// One per registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    pub path: PathBuf,
    pub target: WatchTarget,
}

/// Bookkeeping between the register and the backend.
///
/// Registered paths get exactly one handle each. Probe directories (where
/// future entries or missing dependencies may appear) are refcounted, since
/// several specifications or dangling references can share one directory.
#[derive(Debug)]
pub struct WatchManager {
    backend: Option<Box<dyn WatchBackend>>,
    handles: HashMap<PathKey, WatchHandle>,
    probes: HashMap<WatchTarget, usize>,
}

impl WatchManager {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend: Some(backend),
            handles: HashMap::new(),
            probes: HashMap::new(),
        }
    }

    fn backend(&mut self) -> Result<&mut Box<dyn WatchBackend>, WatchError> {
        self.backend.as_mut().ok_or(WatchError::Closed)
    }

    /// Open the handle for a registered path. No-op if one already exists.
    pub fn watch_path(&mut self, key: PathKey, path: &Path) -> Result<(), WatchError> {
        if self.handles.contains_key(&key) {
            return Ok(());
        }
        let target = WatchTarget::File(path.to_path_buf());
        self.backend()?.watch(&target)?;
        trace!(?path, "watch handle opened");
        self.handles.insert(
            key,
            WatchHandle {
                path: path.to_path_buf(),
                target,
            },
        );
        Ok(())
    }

    pub fn unwatch_path(&mut self, key: &PathKey) -> Result<(), WatchError> {
        let Some(handle) = self.handles.remove(key) else {
            return Ok(());
        };
        trace!(path = ?handle.path, "watch handle closed");
        self.backend()?.unwatch(&handle.target)
    }

    pub fn add_probe(&mut self, target: WatchTarget) -> Result<(), WatchError> {
        if let Some(count) = self.probes.get_mut(&target) {
            *count += 1;
            return Ok(());
        }
        self.backend()?.watch(&target)?;
        debug!(?target, "probe opened");
        self.probes.insert(target, 1);
        Ok(())
    }

    pub fn remove_probe(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let Some(count) = self.probes.get_mut(target) else {
            return Ok(());
        };
        *count -= 1;
        if *count > 0 {
            return Ok(());
        }
        self.probes.remove(target);
        debug!(?target, "probe closed");
        self.backend()?.unwatch(target)
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn probe_targets(&self) -> Vec<WatchTarget> {
        let mut targets: Vec<WatchTarget> = self.probes.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Unsubscribe every handle and probe, keeping the backend open.
    /// Failures are logged; the table ends up empty either way.
    pub fn release_all(&mut self) {
        let mut targets: Vec<WatchTarget> =
            self.handles.drain().map(|(_, handle)| handle.target).collect();
        // One backend subscription per probe, however many users it has.
        targets.extend(self.probes.drain().map(|(target, _)| target));
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        for target in targets {
            if let Err(err) = backend.unwatch(&target) {
                warn!(?target, error = %err, "unwatch failed while releasing");
            }
        }
    }

    /// Forget every handle and hand the backend over for closing. Later
    /// watch calls fail with [`WatchError::Closed`].
    pub fn shutdown(&mut self) -> Option<Box<dyn WatchBackend>> {
        self.handles.clear();
        self.probes.clear();
        self.backend.take()
    }
}
