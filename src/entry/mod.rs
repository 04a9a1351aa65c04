// src/entry/mod.rs

//! Entry resolution.
//!
//! Turns entry specifications (literal paths or glob patterns) into concrete
//! entry files, answers "does this path match any specification?" for paths
//! that appear later, and names the directories that must be observed so
//! that not-yet-existing matches are noticed.

pub mod patterns;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::fs::{normalize_lexically, FileSystem};
use crate::types::{CaseSensitivity, PathKey};
use crate::watch::WatchTarget;

pub use patterns::{is_glob, GlobMatcher, LiteralMatcher};

/// One entry specification as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySpec {
    Literal(PathBuf),
    Pattern(String),
}

impl EntrySpec {
    pub fn parse(spec: &str) -> Self {
        if is_glob(spec) {
            EntrySpec::Pattern(spec.to_string())
        } else {
            EntrySpec::Literal(PathBuf::from(spec))
        }
    }

    pub fn is_relative(&self) -> bool {
        match self {
            EntrySpec::Literal(path) => path.is_relative(),
            EntrySpec::Pattern(pattern) => Path::new(pattern).is_relative(),
        }
    }

    /// Make a relative specification absolute under `base_dir`. Absolute
    /// ones are returned unchanged.
    pub fn anchored(self, base_dir: &Path) -> Self {
        match self {
            EntrySpec::Literal(path) if path.is_relative() => {
                EntrySpec::Literal(normalize_lexically(&base_dir.join(path)))
            }
            EntrySpec::Pattern(pattern) if Path::new(&pattern).is_relative() => {
                let trimmed = pattern.strip_prefix("./").unwrap_or(&pattern);
                EntrySpec::Pattern(format!(
                    "{}/{}",
                    base_dir.to_string_lossy().trim_end_matches('/'),
                    trimmed
                ))
            }
            other => other,
        }
    }

    pub fn compile(&self, case: CaseSensitivity) -> Result<Box<dyn PathMatcher>> {
        Ok(match self {
            EntrySpec::Literal(path) => Box::new(LiteralMatcher::new(path.clone(), case)),
            EntrySpec::Pattern(pattern) => Box::new(GlobMatcher::new(pattern, case)?),
        })
    }
}

impl From<&str> for EntrySpec {
    fn from(spec: &str) -> Self {
        EntrySpec::parse(spec)
    }
}

impl From<String> for EntrySpec {
    fn from(spec: String) -> Self {
        EntrySpec::parse(&spec)
    }
}

impl From<PathBuf> for EntrySpec {
    fn from(path: PathBuf) -> Self {
        EntrySpec::Literal(path)
    }
}

impl From<&Path> for EntrySpec {
    fn from(path: &Path) -> Self {
        EntrySpec::Literal(path.to_path_buf())
    }
}

/// The path-matcher seam: expands a specification into existing files and
/// knows where to look for future matches.
pub trait PathMatcher: Send + Sync + Debug {
    fn describe(&self) -> String;

    fn matches(&self, path: &Path) -> bool;

    /// Existing files currently matching, sorted.
    fn expand(&self, fs: &dyn FileSystem) -> Vec<PathBuf>;

    /// Directory to observe so that future matches are noticed.
    fn probe_target(&self, fs: &dyn FileSystem) -> Option<WatchTarget>;
}

#[derive(Debug)]
pub struct EntryResolver {
    matchers: Vec<Box<dyn PathMatcher>>,
    case: CaseSensitivity,
}

impl EntryResolver {
    pub fn new(specs: &[EntrySpec], case: CaseSensitivity) -> Result<Self> {
        let matchers = specs
            .iter()
            .map(|spec| spec.compile(case))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matchers, case })
    }

    /// Every existing file matching at least one specification, each file
    /// once even when several specifications match it.
    pub fn expand(&self, fs: &dyn FileSystem) -> Vec<PathBuf> {
        let mut seen: BTreeSet<PathKey> = BTreeSet::new();
        let mut out = Vec::new();
        for matcher in &self.matchers {
            for path in matcher.expand(fs) {
                if seen.insert(self.case.key(&path)) {
                    out.push(path);
                }
            }
        }
        out
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }

    pub fn probe_targets(&self, fs: &dyn FileSystem) -> Vec<WatchTarget> {
        let mut targets: Vec<WatchTarget> = Vec::new();
        for target in self.matchers.iter().filter_map(|m| m.probe_target(fs)) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }

    /// Specifications that currently match none of `active`.
    pub fn pending(&self, active: &[PathBuf]) -> Vec<String> {
        self.matchers
            .iter()
            .filter(|m| !active.iter().any(|p| m.matches(p)))
            .map(|m| m.describe())
            .collect()
    }
}
