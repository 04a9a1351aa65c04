// src/graph/builder.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::ResolveError;
use crate::fs::FileSystem;
use crate::resolver::StaticResolver;
use crate::types::{CaseSensitivity, PathKey};

use super::DependencyGraph;

/// Result of walking the references of one entry.
#[derive(Debug, Default)]
pub struct Traversal {
    /// Every existing file reached, the root included.
    pub reached: BTreeMap<PathKey, PathBuf>,
    /// Fresh resolver output for nodes the graph did not know yet.
    pub resolved: HashMap<PathKey, Vec<PathBuf>>,
    /// `(referrer, missing path)` for references to files that do not exist.
    pub dangling: Vec<(PathKey, PathBuf)>,
    pub errors: Vec<ResolveError>,
}

/// Computes closures on top of the current graph.
///
/// Nodes already in the graph reuse their stored references, so a rebuild
/// only calls the resolver for files it has never seen (or whose stored
/// references were invalidated by a change).
pub struct GraphBuilder<'a> {
    fs: &'a dyn FileSystem,
    resolver: &'a dyn StaticResolver,
    case: CaseSensitivity,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        resolver: &'a dyn StaticResolver,
        case: CaseSensitivity,
    ) -> Self {
        Self { fs, resolver, case }
    }

    /// Resolve one file. A failure yields no references along with the error.
    pub fn resolve_refs(&self, path: &Path) -> (Vec<PathBuf>, Option<ResolveError>) {
        match self.resolver.resolve(self.fs, path) {
            Ok(refs) => (refs, None),
            Err(err) => {
                warn!(?path, error = %err, "resolution failed, treating as leaf");
                (Vec::new(), Some(err))
            }
        }
    }

    /// Collect everything reachable from `root`.
    ///
    /// A node is marked reached before its references are followed, so
    /// cycles (self-references included) terminate after one visit.
    pub fn traverse(&self, root: &Path, graph: &DependencyGraph) -> Traversal {
        let mut t = Traversal::default();
        let mut stack = vec![(self.case.key(root), root.to_path_buf())];

        while let Some((key, path)) = stack.pop() {
            if t.reached.contains_key(&key) {
                continue;
            }
            t.reached.insert(key.clone(), path.clone());

            let refs = match graph.refs_of(&key) {
                Some(known) => known.to_vec(),
                None => {
                    let (refs, err) = self.resolve_refs(&path);
                    t.errors.extend(err);
                    t.resolved.insert(key.clone(), refs.clone());
                    refs
                }
            };

            for target in refs {
                let target_key = self.case.key(&target);
                if t.reached.contains_key(&target_key) {
                    continue;
                }
                if graph.contains_key(&target_key) || self.fs.is_file(&target) {
                    stack.push((target_key, target));
                } else {
                    t.dangling.push((key.clone(), target));
                }
            }
        }

        debug!(
            ?root,
            reached = t.reached.len(),
            resolved = t.resolved.len(),
            dangling = t.dangling.len(),
            "traversal finished"
        );
        t
    }
}
