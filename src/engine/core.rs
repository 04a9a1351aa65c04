// src/engine/core.rs

//! Pure propagation state machine.
//!
//! [`PropagationEngine`] consumes classified filesystem changes and produces
//! an [`EngineStep`]: the notifications to deliver and the paths that need a
//! delayed retry. It owns the graph, the entry resolver and the watch
//! manager, and performs no waiting of its own, so tests can drive it
//! directly with a mock filesystem and a mock backend.
//!
//! The async shell (`engine::runtime::Reactor`) handles channels, timers and
//! listener dispatch.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::entry::EntryResolver;
use crate::errors::{DepwatchError, Result};
use crate::fs::FileSystem;
use crate::graph::{DependencyGraph, RegisterEntry};
use crate::listeners::DepEvent;
use crate::resolver::StaticResolver;
use crate::types::{CaseSensitivity, PathKey};
use crate::watch::{classify, FsChange, RawEvent, WatchBackend, WatchManager, WatchTarget};

use super::EngineStep;

#[derive(Debug)]
pub struct PropagationEngine {
    pub(super) fs: Arc<dyn FileSystem>,
    pub(super) resolver: Arc<dyn StaticResolver>,
    pub(super) entries: EntryResolver,
    pub(super) graph: DependencyGraph,
    pub(super) watches: WatchManager,
    pub(super) dangling_probes: HashMap<PathKey, WatchTarget>,
    pub(super) case: CaseSensitivity,
    halted: bool,
}

impl PropagationEngine {
    pub fn new(
        entries: EntryResolver,
        fs: Arc<dyn FileSystem>,
        resolver: Arc<dyn StaticResolver>,
        backend: Box<dyn WatchBackend>,
        case: CaseSensitivity,
    ) -> Self {
        Self {
            fs,
            resolver,
            entries,
            graph: DependencyGraph::new(case),
            watches: WatchManager::new(backend),
            dangling_probes: HashMap::new(),
            case,
            halted: false,
        }
    }

    /// Open the specification probes and build the initial graph.
    ///
    /// Initial entries do not produce `Add` notifications. A failure to watch
    /// is fatal; resolution failures are returned as warnings and the
    /// affected files are treated as leaves.
    pub fn initialize(&mut self) -> Result<Vec<Arc<DepwatchError>>> {
        for target in self.entries.probe_targets(&*self.fs) {
            self.watches.add_probe(target)?;
        }

        let mut step = EngineStep::default();
        for path in self.entries.expand(&*self.fs) {
            self.activate_entry(&path, &mut step, false);
        }

        let mut warnings = Vec::new();
        for event in step.events {
            let DepEvent::Error(err) = event else {
                continue;
            };
            if matches!(*err, DepwatchError::Watch(_)) {
                return Err(Arc::try_unwrap(err)
                    .unwrap_or_else(|shared| anyhow::anyhow!(shared.to_string()).into()));
            }
            warn!(error = %err, "initial build");
            warnings.push(err);
        }

        info!(
            entries = self.graph.entry_keys().len(),
            registered = self.graph.len(),
            pending = self.pending().len(),
            "initial graph built"
        );
        Ok(warnings)
    }

    /// Classify a raw backend event against the current register.
    pub fn classify(&self, raw: &RawEvent) -> Vec<FsChange> {
        classify(raw, self.case, &*self.fs, |p| self.graph.contains(p))
    }

    /// Apply one classified change.
    pub fn apply(&mut self, change: FsChange) -> EngineStep {
        let mut step = EngineStep::default();
        if self.halted {
            return step;
        }
        debug!(?change, "applying change");
        match change {
            FsChange::Changed(path) => self.on_changed(&path, &mut step),
            FsChange::Appeared(path) => self.on_appeared(&path, &mut step),
            FsChange::Disappeared(path) => self.on_disappeared(&path, &mut step),
            FsChange::RenamedCaseOnly { from, to } => {
                self.on_renamed_case_only(&from, &to, &mut step)
            }
            FsChange::RenamedStructural { from, to } => {
                self.on_renamed_structural(&from, &to, &mut step)
            }
        }
        self.conclude(step)
    }

    /// Classify and apply a raw event without any settle delay, collecting
    /// every resulting notification. Retries are returned, not performed.
    pub fn step(&mut self, raw: RawEvent) -> EngineStep {
        if raw == RawEvent::Rescan {
            return self.rescan();
        }
        let mut step = EngineStep::default();
        for change in self.classify(&raw) {
            step.merge(self.apply(change));
        }
        step
    }

    /// Second and final resolution attempt for a freshly appeared path.
    /// Errors are surfaced this time.
    pub fn retry(&mut self, path: &Path) -> EngineStep {
        let mut step = EngineStep::default();
        if self.halted {
            return step;
        }
        debug!(?path, "retrying resolution");
        if self.graph.contains(path) && self.refresh_node(path, &mut step) {
            let ids = self.graph.owners(path);
            if !ids.is_empty() {
                step.events.push(DepEvent::Update(ids));
            }
        }
        self.conclude(step)
    }

    /// Re-poll every specification and every dangling reference, picking up
    /// anything the backend failed to report.
    pub fn rescan(&mut self) -> EngineStep {
        let mut step = EngineStep::default();
        if self.halted {
            return step;
        }
        debug!("rescanning entry specifications");

        for id in self.graph.entry_ids() {
            if !self.fs.is_file(&id) {
                self.on_disappeared(&id, &mut step);
            }
        }
        for path in self.entries.expand(&*self.fs) {
            if !self.graph.is_entry(&self.case.key(&path)) {
                self.on_appeared(&path, &mut step);
            }
        }
        for missing in self.graph.dangling_paths() {
            if self.fs.is_file(&missing) {
                self.on_appeared(&missing, &mut step);
            }
        }
        self.conclude(step)
    }

    /// After a failed watch the register can no longer be trusted: keep
    /// only the errors, then drop the graph together with every
    /// subscription so that nothing is registered without a watch.
    fn conclude(&mut self, mut step: EngineStep) -> EngineStep {
        if !step.fatal {
            return step;
        }
        step.events.retain(|event| matches!(event, DepEvent::Error(_)));
        step.retries.clear();
        error!(
            registered = self.graph.len(),
            "watch subscription failed; halting"
        );
        self.halt();
        step
    }

    fn halt(&mut self) {
        self.watches.release_all();
        self.dangling_probes.clear();
        self.graph = DependencyGraph::new(self.case);
        self.halted = true;
    }

    /// True once a watch failure or `shutdown` has emptied the engine.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Active entry ids, sorted.
    pub fn ids(&self) -> Vec<PathBuf> {
        let mut ids = self.graph.entry_ids();
        ids.sort();
        ids
    }

    pub fn register(&self) -> BTreeMap<PathBuf, RegisterEntry> {
        self.graph.register()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn watches(&self) -> &WatchManager {
        &self.watches
    }

    /// Entry specifications that currently match no active entry.
    pub fn pending(&self) -> Vec<String> {
        self.entries.pending(&self.graph.entry_ids())
    }

    /// Release every watch handle and hand the backend over for closing.
    /// The register is emptied along with the handles.
    pub fn shutdown(&mut self) -> Option<Box<dyn WatchBackend>> {
        self.dangling_probes.clear();
        self.graph = DependencyGraph::new(self.case);
        self.halted = true;
        self.watches.shutdown()
    }
}
