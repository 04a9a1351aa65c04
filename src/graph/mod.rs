// src/graph/mod.rs

//! Dependency graph and register.
//!
//! Every file reachable from at least one active entry has exactly one
//! [`Node`] here, carrying the set of entries that reach it (its owners).
//! The node map doubles as the register: a path is watched if and only if
//! it has a node.
//!
//! Each entry additionally remembers its closure (the keys it reached on the
//! last build pass) so that a rebuild can be diffed against it: keys that
//! drop out lose that owner, and nodes left without owners are pruned.
//!
//! Missing referenced paths are kept separately as *dangling* references so
//! that the file appearing later can be attributed to its referrers.

pub mod builder;
pub mod export;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::types::{CaseSensitivity, PathKey};

pub use builder::{GraphBuilder, Traversal};

#[derive(Debug, Clone)]
pub struct Node {
    pub path: PathBuf,
    /// Immediate references from the last successful or failed resolution.
    pub refs: Vec<PathBuf>,
    pub owners: BTreeSet<PathKey>,
}

#[derive(Debug, Clone)]
struct EntryRecord {
    id: PathBuf,
    closure: BTreeSet<PathKey>,
}

#[derive(Debug, Clone)]
struct Dangling {
    path: PathBuf,
    referrers: BTreeSet<PathKey>,
}

/// Snapshot of one register slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterEntry {
    /// Owning entry ids, sorted.
    pub entries: Vec<PathBuf>,
}

/// Watch bookkeeping implied by a graph mutation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterDelta {
    /// Paths that entered the register.
    pub inserted: Vec<(PathKey, PathBuf)>,
    /// Paths that left the register.
    pub removed: Vec<PathKey>,
    /// Missing paths that became referenced.
    pub dangling_added: Vec<(PathKey, PathBuf)>,
    /// Missing paths no longer referenced by anything.
    pub dangling_removed: Vec<PathKey>,
}

impl RegisterDelta {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.removed.is_empty()
            && self.dangling_added.is_empty()
            && self.dangling_removed.is_empty()
    }
}

#[derive(Debug)]
pub struct DependencyGraph {
    case: CaseSensitivity,
    nodes: HashMap<PathKey, Node>,
    entries: BTreeMap<PathKey, EntryRecord>,
    dangling: HashMap<PathKey, Dangling>,
}

impl DependencyGraph {
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            case,
            nodes: HashMap::new(),
            entries: BTreeMap::new(),
            dangling: HashMap::new(),
        }
    }

    pub fn key(&self, path: &Path) -> PathKey {
        self.case.key(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(&self.key(path))
    }

    pub fn contains_key(&self, key: &PathKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &PathKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&PathKey, &Node)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn refs_of(&self, key: &PathKey) -> Option<&[PathBuf]> {
        self.nodes.get(key).map(|n| n.refs.as_slice())
    }

    /// Replace a node's references. Returns true if the set of referenced
    /// identities changed (a structural change).
    pub fn set_refs(&mut self, key: &PathKey, refs: Vec<PathBuf>) -> bool {
        let case = self.case;
        let Some(node) = self.nodes.get_mut(key) else {
            return false;
        };
        let old: BTreeSet<PathKey> = node.refs.iter().map(|p| case.key(p)).collect();
        let new: BTreeSet<PathKey> = refs.iter().map(|p| case.key(p)).collect();
        node.refs = refs;
        old != new
    }

    pub fn is_entry(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry_path(&self, key: &PathKey) -> Option<&Path> {
        self.entries.get(key).map(|e| e.id.as_path())
    }

    pub fn entry_keys(&self) -> Vec<PathKey> {
        self.entries.keys().cloned().collect()
    }

    /// Active entry ids in key order.
    pub fn entry_ids(&self) -> Vec<PathBuf> {
        self.entries.values().map(|e| e.id.clone()).collect()
    }

    pub fn closure(&self, key: &PathKey) -> Option<&BTreeSet<PathKey>> {
        self.entries.get(key).map(|e| &e.closure)
    }

    pub fn owner_keys(&self, key: &PathKey) -> BTreeSet<PathKey> {
        self.nodes
            .get(key)
            .map(|n| n.owners.clone())
            .unwrap_or_default()
    }

    /// Entry ids for a set of owner keys, sorted and without duplicates.
    pub fn ids_for<'a>(&self, keys: impl IntoIterator<Item = &'a PathKey>) -> Vec<PathBuf> {
        let ids: BTreeSet<PathBuf> = keys
            .into_iter()
            .filter_map(|k| self.entries.get(k).map(|e| e.id.clone()))
            .collect();
        ids.into_iter().collect()
    }

    /// Owning entry ids of `path`, sorted. Empty if unregistered.
    pub fn owners(&self, path: &Path) -> Vec<PathBuf> {
        let key = self.key(path);
        match self.nodes.get(&key) {
            Some(node) => self.ids_for(&node.owners),
            None => Vec::new(),
        }
    }

    pub fn is_dangling(&self, key: &PathKey) -> bool {
        self.dangling.contains_key(key)
    }

    pub fn dangling_referrers(&self, key: &PathKey) -> BTreeSet<PathKey> {
        self.dangling
            .get(key)
            .map(|d| d.referrers.clone())
            .unwrap_or_default()
    }

    /// Missing referenced paths, sorted.
    pub fn dangling_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.dangling.values().map(|d| d.path.clone()).collect();
        paths.sort();
        paths
    }

    /// Register a new active entry with an empty closure. The caller follows
    /// up with a traversal. Returns false if it was already active.
    pub fn insert_entry(&mut self, path: &Path) -> bool {
        let key = self.key(path);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key,
            EntryRecord {
                id: path.to_path_buf(),
                closure: BTreeSet::new(),
            },
        );
        true
    }

    /// Replace an entry's closure with the result of a fresh traversal.
    pub fn apply_traversal(&mut self, entry: &PathKey, traversal: Traversal) -> RegisterDelta {
        let mut delta = RegisterDelta::default();
        let Some(record) = self.entries.get(entry) else {
            return delta;
        };
        let old_closure = record.closure.clone();

        for (key, refs) in traversal.resolved {
            if let Some(path) = traversal.reached.get(&key) {
                let node = self.nodes.entry(key).or_insert_with(|| Node {
                    path: path.clone(),
                    refs: Vec::new(),
                    owners: BTreeSet::new(),
                });
                node.refs = refs;
            }
        }

        let mut new_closure = BTreeSet::new();
        for (key, path) in &traversal.reached {
            let node = self.nodes.entry(key.clone()).or_insert_with(|| Node {
                path: path.clone(),
                refs: Vec::new(),
                owners: BTreeSet::new(),
            });
            if node.owners.is_empty() {
                delta.inserted.push((key.clone(), path.clone()));
            }
            node.owners.insert(entry.clone());
            new_closure.insert(key.clone());
        }

        for key in old_closure.difference(&new_closure) {
            self.drop_owner(key, entry, &mut delta);
        }

        // Dangling references are a property of the referring node, so every
        // node visited by this traversal gets its set rebuilt.
        self.clear_referrers(traversal.reached.keys(), &mut delta);
        for (referrer, missing) in traversal.dangling {
            self.add_dangling(referrer, missing, &mut delta);
        }

        if let Some(record) = self.entries.get_mut(entry) {
            record.closure = new_closure;
        }
        trace!(?entry, ?delta, "closure applied");
        delta
    }

    /// Deactivate an entry and release everything only it reached.
    pub fn remove_entry(&mut self, entry: &PathKey) -> Option<(PathBuf, RegisterDelta)> {
        let record = self.entries.remove(entry)?;
        let mut delta = RegisterDelta::default();
        for key in &record.closure {
            self.drop_owner(key, entry, &mut delta);
        }
        Some((record.id, delta))
    }

    /// Drop a node whose file is gone. Returns the entries that reached it;
    /// their closures still list it until they are rebuilt.
    pub fn forget_node(&mut self, key: &PathKey) -> (BTreeSet<PathKey>, RegisterDelta) {
        let mut delta = RegisterDelta::default();
        let Some(node) = self.nodes.remove(key) else {
            return (BTreeSet::new(), delta);
        };
        delta.removed.push(key.clone());
        self.clear_referrers(std::iter::once(key), &mut delta);
        (node.owners, delta)
    }

    fn drop_owner(&mut self, key: &PathKey, entry: &PathKey, delta: &mut RegisterDelta) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.owners.remove(entry);
        if node.owners.is_empty() {
            self.nodes.remove(key);
            delta.removed.push(key.clone());
            self.clear_referrers(std::iter::once(key), delta);
        }
    }

    fn clear_referrers<'a>(
        &mut self,
        referrers: impl IntoIterator<Item = &'a PathKey>,
        delta: &mut RegisterDelta,
    ) {
        let referrers: BTreeSet<&PathKey> = referrers.into_iter().collect();
        if referrers.is_empty() {
            return;
        }
        self.dangling.retain(|key, dangling| {
            dangling.referrers.retain(|r| !referrers.contains(r));
            if dangling.referrers.is_empty() {
                delta.dangling_removed.push(key.clone());
                false
            } else {
                true
            }
        });
    }

    fn add_dangling(&mut self, referrer: PathKey, missing: PathBuf, delta: &mut RegisterDelta) {
        let key = self.key(&missing);
        let slot = self.dangling.entry(key.clone()).or_insert_with(|| Dangling {
            path: missing.clone(),
            referrers: BTreeSet::new(),
        });
        if slot.referrers.is_empty() {
            // Cleared and re-added within one pass nets out.
            if let Some(pos) = delta.dangling_removed.iter().position(|k| k == &key) {
                delta.dangling_removed.remove(pos);
            } else {
                delta.dangling_added.push((key, missing));
            }
        }
        slot.referrers.insert(referrer);
    }

    /// Snapshot of the register, keyed by display path.
    pub fn register(&self) -> BTreeMap<PathBuf, RegisterEntry> {
        self.nodes
            .values()
            .map(|node| {
                (
                    node.path.clone(),
                    RegisterEntry {
                        entries: self.ids_for(&node.owners),
                    },
                )
            })
            .collect()
    }
}
