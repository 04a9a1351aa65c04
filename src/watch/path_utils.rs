// src/watch/path_utils.rs

//! Utility functions for presenting watched paths.

use std::path::Path;

/// Render `path` relative to `root` with forward slashes.
///
/// Watched paths may have been removed by the time they are printed, so the
/// canonicalizing fallback is only tried when both paths still exist. Paths
/// outside `root` are rendered as given.
pub fn display_relative(root: &Path, path: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        return slashes(rel);
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize())
        && let Ok(rel) = path_canon.strip_prefix(&root_canon)
    {
        return slashes(rel);
    }

    slashes(path)
}

fn slashes(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.is_empty() { ".".to_string() } else { s }
}
