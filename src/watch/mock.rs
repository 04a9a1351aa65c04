// src/watch/mock.rs

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::WatchError;

use super::{WatchBackend, WatchTarget};

/// Operation recorded by [`MockWatchBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Watch(WatchTarget),
    Unwatch(WatchTarget),
    Close,
}

#[derive(Debug, Default)]
struct MockWatchState {
    active: BTreeMap<WatchTarget, usize>,
    calls: Vec<WatchCall>,
    failing: HashSet<PathBuf>,
    closed: bool,
}

/// In-memory watch backend. Clones share state, so a test can keep one
/// handle for inspection while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockWatchBackend {
    state: Arc<Mutex<MockWatchState>>,
}

impl MockWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockWatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future `watch` of a target at `path` fail.
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.state().failing.insert(path.into());
    }

    pub fn is_watching(&self, target: &WatchTarget) -> bool {
        self.state().active.contains_key(target)
    }

    /// Active targets with their subscription counts.
    pub fn active(&self) -> BTreeMap<WatchTarget, usize> {
        self.state().active.clone()
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.state().calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl WatchBackend for MockWatchBackend {
    fn watch(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let mut state = self.state();
        if state.closed {
            return Err(WatchError::Closed);
        }
        if state.failing.contains(target.path()) {
            return Err(WatchError::PathWatchFailed {
                path: target.path().to_path_buf(),
                reason: "injected failure".to_string(),
            });
        }
        state.calls.push(WatchCall::Watch(target.clone()));
        *state.active.entry(target.clone()).or_insert(0) += 1;
        Ok(())
    }

    fn unwatch(&mut self, target: &WatchTarget) -> Result<(), WatchError> {
        let mut state = self.state();
        state.calls.push(WatchCall::Unwatch(target.clone()));
        if let Some(count) = state.active.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                state.active.remove(target);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), WatchError> {
        let mut state = self.state();
        state.calls.push(WatchCall::Close);
        state.active.clear();
        state.closed = true;
        Ok(())
    }
}
