// src/entry/patterns.rs

use std::fmt;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use tracing::warn;

use crate::errors::{DepwatchError, Result};
use crate::fs::{nearest_existing_dir, FileSystem};
use crate::types::{CaseSensitivity, PathKey};
use crate::watch::WatchTarget;

use super::PathMatcher;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// True if `spec` should be treated as a glob pattern rather than a path.
pub fn is_glob(spec: &str) -> bool {
    spec.contains(GLOB_META)
}

/// A literal entry path, which may not exist yet.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    path: PathBuf,
    key: PathKey,
    case: CaseSensitivity,
}

impl LiteralMatcher {
    pub fn new(path: impl Into<PathBuf>, case: CaseSensitivity) -> Self {
        let path = path.into();
        let key = case.key(&path);
        Self { path, key, case }
    }
}

impl PathMatcher for LiteralMatcher {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn matches(&self, path: &Path) -> bool {
        self.case.key(path) == self.key
    }

    fn expand(&self, fs: &dyn FileSystem) -> Vec<PathBuf> {
        if fs.is_file(&self.path) {
            vec![self.path.clone()]
        } else {
            Vec::new()
        }
    }

    fn probe_target(&self, fs: &dyn FileSystem) -> Option<WatchTarget> {
        let parent = self.path.parent()?;
        if fs.is_dir(parent) {
            return Some(WatchTarget::Dir(parent.to_path_buf()));
        }
        nearest_existing_dir(fs, parent).map(WatchTarget::Tree)
    }
}

/// Compiled glob entry pattern.
///
/// The pattern is split into a literal base directory (the longest leading
/// run of components without glob syntax) and the glob itself. Expansion only
/// walks below the base directory.
#[derive(Clone)]
pub struct GlobMatcher {
    pattern: String,
    base: PathBuf,
    recursive: bool,
    matcher: globset::GlobMatcher,
}

impl fmt::Debug for GlobMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobMatcher")
            .field("pattern", &self.pattern)
            .field("base", &self.base)
            .field("recursive", &self.recursive)
            .finish_non_exhaustive()
    }
}

impl GlobMatcher {
    pub fn new(pattern: &str, case: CaseSensitivity) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(case == CaseSensitivity::Insensitive)
            .build()
            .map_err(|e| DepwatchError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        let (base, rest) = split_base(Path::new(pattern));
        let recursive = rest > 1 || pattern.contains("**");

        Ok(Self {
            pattern: pattern.to_string(),
            base,
            recursive,
            matcher: glob.compile_matcher(),
        })
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

/// Split a pattern into its literal base directory and the number of
/// components that follow it.
fn split_base(pattern: &Path) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut rest = 0;
    for component in pattern.components() {
        let literal = match component {
            Component::Normal(part) => !part.to_string_lossy().contains(GLOB_META),
            _ => true,
        };
        if rest == 0 && literal {
            base.push(component.as_os_str());
        } else {
            rest += 1;
        }
    }
    if base.as_os_str().is_empty() {
        base.push(".");
    }
    (base, rest)
}

impl PathMatcher for GlobMatcher {
    fn describe(&self) -> String {
        self.pattern.clone()
    }

    fn matches(&self, path: &Path) -> bool {
        let path = path.strip_prefix(".").unwrap_or(path);
        self.matcher.is_match(path)
    }

    fn expand(&self, fs: &dyn FileSystem) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if !fs.is_dir(&self.base) {
            return files;
        }

        let mut stack = vec![self.base.clone()];
        while let Some(dir) = stack.pop() {
            let children = match fs.read_dir(&dir) {
                Ok(children) => children,
                Err(err) => {
                    warn!(pattern = %self.pattern, ?dir, error = %err, "cannot list directory");
                    continue;
                }
            };
            for path in children {
                if fs.is_dir(&path) {
                    if self.recursive {
                        stack.push(path);
                    }
                } else if fs.is_file(&path) && self.matches(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        files
    }

    fn probe_target(&self, fs: &dyn FileSystem) -> Option<WatchTarget> {
        if fs.is_dir(&self.base) {
            return Some(if self.recursive {
                WatchTarget::Tree(self.base.clone())
            } else {
                WatchTarget::Dir(self.base.clone())
            });
        }
        nearest_existing_dir(fs, &self.base).map(WatchTarget::Tree)
    }
}
