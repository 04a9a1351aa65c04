// src/graph/export.rs

//! Read-only views of the dependency graph built on `petgraph`.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::types::PathKey;

use super::DependencyGraph;

fn to_petgraph(graph: &DependencyGraph) -> DiGraph<PathBuf, ()> {
    let mut keys: Vec<(&PathKey, PathBuf)> = graph
        .nodes()
        .map(|(key, node)| (key, node.path.clone()))
        .collect();
    keys.sort();

    let mut g = DiGraph::new();
    let mut index: HashMap<&PathKey, NodeIndex> = HashMap::new();
    for (key, path) in keys {
        index.insert(key, g.add_node(path));
    }

    for (key, node) in graph.nodes() {
        let from = index[key];
        for target in &node.refs {
            if let Some(&to) = index.get(&graph.key(target)) {
                g.update_edge(from, to, ());
            }
        }
    }
    g
}

/// Graphviz rendering of the registered files and their references.
pub fn to_dot(graph: &DependencyGraph) -> String {
    let g = to_petgraph(graph).map(|_, path| path.display().to_string(), |_, _| "");
    format!("{}", Dot::with_config(&g, &[Config::EdgeNoLabel]))
}

/// Reference cycles among registered files, each sorted, self-references
/// included.
pub fn cycles(graph: &DependencyGraph) -> Vec<Vec<PathBuf>> {
    let g = to_petgraph(graph);
    let mut out: Vec<Vec<PathBuf>> = tarjan_scc(&g)
        .into_iter()
        .filter(|scc| scc.len() > 1 || g.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut paths: Vec<PathBuf> = scc.into_iter().map(|i| g[i].clone()).collect();
            paths.sort();
            paths
        })
        .collect();
    out.sort();
    out
}
