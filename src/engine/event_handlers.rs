// src/engine/event_handlers.rs

//! Change handlers for [`PropagationEngine`].
//!
//! Every handler appends to an [`EngineStep`] and leaves the register, the
//! watch table and the graph consistent with each other before it returns.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ResolveError;
use crate::fs::{nearest_existing_dir, FileSystem};
use crate::graph::{GraphBuilder, RegisterDelta};
use crate::listeners::DepEvent;
use crate::types::PathKey;
use crate::watch::WatchTarget;

use super::core::PropagationEngine;
use super::EngineStep;

impl PropagationEngine {
    fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(&*self.fs, &*self.resolver, self.case)
    }

    pub(super) fn on_changed(&mut self, path: &Path, step: &mut EngineStep) {
        let key = self.case.key(path);
        if !self.graph.contains_key(&key) {
            if self.fs.is_file(path) {
                self.on_appeared(path, step);
            }
            return;
        }

        self.refresh_node(path, step);
        let ids = self.graph.owners(path);
        if !ids.is_empty() {
            step.events.push(DepEvent::Update(ids));
        }
    }

    pub(super) fn on_appeared(&mut self, path: &Path, step: &mut EngineStep) {
        let key = self.case.key(path);
        let was_tracked = self.graph.contains_key(&key);

        if self.entries.matches(path)
            && !self.graph.is_entry(&key)
            && self.activate_entry(path, step, !was_tracked)
        {
            step.events.push(DepEvent::Add(path.to_path_buf()));
        }

        if was_tracked {
            self.on_changed(path, step);
            return;
        }

        let referrers = self.graph.dangling_referrers(&key);
        if referrers.is_empty() {
            return;
        }
        let mut owners = BTreeSet::new();
        for referrer in &referrers {
            owners.extend(self.graph.owner_keys(referrer));
        }
        debug!(?path, referrers = referrers.len(), "dangling reference resolved");
        self.recompute(&owners, step, Some(&key));

        let ids = self.graph.ids_for(&owners);
        if !ids.is_empty() {
            step.events.push(DepEvent::Update(ids));
        }
    }

    pub(super) fn on_disappeared(&mut self, path: &Path, step: &mut EngineStep) {
        let key = self.case.key(path);

        if let Some((id, delta)) = self.graph.remove_entry(&key) {
            self.apply_delta(delta, step);
            info!(entry = ?id, "entry removed");
            step.events.push(DepEvent::Remove(id));
        }

        if !self.graph.contains_key(&key) {
            return;
        }
        let (owners, delta) = self.graph.forget_node(&key);
        self.apply_delta(delta, step);
        self.recompute(&owners, step, None);

        let ids = self.graph.ids_for(&owners);
        if !ids.is_empty() {
            step.events.push(DepEvent::Update(ids));
        }
    }

    /// The file keeps its identity (and its original display path).
    pub(super) fn on_renamed_case_only(&mut self, from: &Path, to: &Path, step: &mut EngineStep) {
        debug!(?from, ?to, "case-only rename");
        let path = if self.graph.contains(from) { from } else { to };
        self.on_changed(path, step);
    }

    pub(super) fn on_renamed_structural(&mut self, from: &Path, to: &Path, step: &mut EngineStep) {
        debug!(?from, ?to, "rename");
        if self.graph.contains(from) {
            if self.fs.is_file(from) {
                self.on_changed(from, step);
            } else {
                self.on_disappeared(from, step);
            }
        }
        if self.fs.is_file(to) {
            // Renaming over a tracked file (atomic save) is a content change.
            if self.graph.contains(to) {
                self.on_changed(to, step);
            } else {
                self.on_appeared(to, step);
            }
        }
    }

    /// Make `path` an active entry and build its closure. Returns false if
    /// it does not exist or is already active.
    ///
    /// With `settling`, a resolution failure of the entry file itself is
    /// turned into a scheduled retry instead of an error.
    pub(super) fn activate_entry(&mut self, path: &Path, step: &mut EngineStep, settling: bool) -> bool {
        if !self.fs.is_file(path) || !self.graph.insert_entry(path) {
            return false;
        }
        let key = self.case.key(path);
        let entries = BTreeSet::from([key.clone()]);
        self.recompute(&entries, step, settling.then_some(&key));
        info!(entry = ?path, "entry activated");
        true
    }

    /// Re-resolve a registered file. Returns true when its references
    /// changed, in which case every owner's closure has been rebuilt.
    pub(super) fn refresh_node(&mut self, path: &Path, step: &mut EngineStep) -> bool {
        let key = self.case.key(path);
        let Some(node_path) = self.graph.node(&key).map(|n| n.path.clone()) else {
            return false;
        };

        let (refs, err) = self.builder().resolve_refs(&node_path);
        if let Some(err) = err {
            step.error(err);
        }
        if !self.graph.set_refs(&key, refs) {
            return false;
        }

        debug!(path = ?node_path, "references changed, rebuilding owners");
        let owners = self.graph.owner_keys(&key);
        self.recompute(&owners, step, None);
        true
    }

    /// Rebuild the closures of `entries` and bring the watch table in line.
    pub(super) fn recompute(
        &mut self,
        entries: &BTreeSet<PathKey>,
        step: &mut EngineStep,
        settling: Option<&PathKey>,
    ) {
        for entry in entries {
            let Some(root) = self.graph.entry_path(entry).map(Path::to_path_buf) else {
                continue;
            };
            let mut traversal = self.builder().traverse(&root, &self.graph);
            for err in std::mem::take(&mut traversal.errors) {
                self.report_resolve_error(err, step, settling);
            }
            let delta = self.graph.apply_traversal(entry, traversal);
            self.apply_delta(delta, step);
        }
    }

    fn report_resolve_error(&self, err: ResolveError, step: &mut EngineStep, settling: Option<&PathKey>) {
        if let Some(key) = settling
            && self.case.key(err.path()) == *key
        {
            debug!(path = ?err.path(), error = %err, "deferring error until retry");
            step.schedule_retry(err.path().clone());
            return;
        }
        step.error(err);
    }

    pub(super) fn apply_delta(&mut self, delta: RegisterDelta, step: &mut EngineStep) {
        if delta.is_empty() {
            return;
        }
        for key in delta.removed {
            if let Err(err) = self.watches.unwatch_path(&key) {
                step.error(err);
            }
        }
        for (key, path) in delta.inserted {
            if let Err(err) = self.watches.watch_path(key, &path) {
                step.fail(err);
            }
        }
        for key in delta.dangling_removed {
            if let Some(target) = self.dangling_probes.remove(&key)
                && let Err(err) = self.watches.remove_probe(&target)
            {
                step.error(err);
            }
        }
        for (key, path) in delta.dangling_added {
            if self.dangling_probes.contains_key(&key) {
                continue;
            }
            let Some(target) = dangling_probe_target(&*self.fs, &path) else {
                continue;
            };
            match self.watches.add_probe(target.clone()) {
                Ok(()) => {
                    self.dangling_probes.insert(key, target);
                }
                Err(err) => step.error(err),
            }
        }
    }
}

/// Where to look for a missing referenced file: its parent directory, or
/// the nearest existing ancestor (recursively) if the parent is missing too.
fn dangling_probe_target(fs: &dyn FileSystem, path: &Path) -> Option<WatchTarget> {
    let parent: PathBuf = path.parent()?.to_path_buf();
    if fs.is_dir(&parent) {
        return Some(WatchTarget::Dir(parent));
    }
    nearest_existing_dir(fs, &parent).map(WatchTarget::Tree)
}
