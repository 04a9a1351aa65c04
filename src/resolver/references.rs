// src/resolver/references.rs

//! Regex-driven reference extraction for JavaScript-style module files.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use regex::Regex;
use tracing::trace;

use crate::errors::{DepwatchError, ResolveError, Result};
use crate::fs::{normalize_lexically, FileSystem};

use super::StaticResolver;

/// Default specifier patterns. Capture group 1 is the specifier.
pub const DEFAULT_PATTERNS: &[&str] = &[
    r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
    r#"(?m)^\s*import\s+(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]"#,
    r#"(?m)^\s*export\s+[^'";]*?\s+from\s+['"]([^'"]+)['"]"#,
    r#"import\(\s*['"]([^'"]+)['"]\s*\)"#,
];

pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json"];

pub const DEFAULT_INDEX_FILES: &[&str] = &["index"];

/// Raw resolver settings, as they appear under `[resolver]` in the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub patterns: Vec<String>,
    pub extensions: Vec<String>,
    pub index_files: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            index_files: DEFAULT_INDEX_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Resolver that scans file content with a set of regexes and maps each
/// local specifier onto a path, probing extensions and index files.
///
/// Bare specifiers (`require('lodash')`) are ignored: third-party packages
/// are never part of the graph.
#[derive(Clone)]
pub struct RegexResolver {
    patterns: Vec<Regex>,
    extensions: Vec<String>,
    index_files: Vec<String>,
}

impl fmt::Debug for RegexResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexResolver")
            .field("patterns", &self.patterns.len())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl Default for RegexResolver {
    fn default() -> Self {
        Self::new(&ResolverSettings::default()).expect("built-in resolver patterns compile")
    }
}

impl RegexResolver {
    pub fn new(settings: &ResolverSettings) -> Result<Self> {
        let mut patterns = Vec::with_capacity(settings.patterns.len());
        for pat in &settings.patterns {
            let re = Regex::new(pat).map_err(|e| {
                DepwatchError::ConfigError(format!("invalid resolver pattern {pat:?}: {e}"))
            })?;
            if re.captures_len() < 2 {
                return Err(DepwatchError::ConfigError(format!(
                    "resolver pattern {pat:?} must have a capture group for the specifier"
                )));
            }
            patterns.push(re);
        }

        Ok(Self {
            patterns,
            extensions: settings.extensions.clone(),
            index_files: settings.index_files.clone(),
        })
    }

    /// Specifiers in source order, duplicates removed.
    pub fn specifiers<'c>(&self, content: &'c str) -> Vec<&'c str> {
        let mut found: Vec<(usize, &str)> = Vec::new();
        for re in &self.patterns {
            for caps in re.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    found.push((m.start(), m.as_str()));
                }
            }
        }
        found.sort_by_key(|(pos, _)| *pos);

        let mut out: Vec<&str> = Vec::with_capacity(found.len());
        for (_, spec) in found {
            if !out.contains(&spec) {
                out.push(spec);
            }
        }
        out
    }

    /// Map a local specifier onto a path relative to `base_dir`.
    ///
    /// When no candidate exists the best guess is returned so the caller can
    /// track it as a dangling reference: the exact path if it carries an
    /// extension, otherwise the path with the first configured extension.
    pub fn resolve_specifier(&self, fs: &dyn FileSystem, base_dir: &Path, spec: &str) -> PathBuf {
        let joined = if Path::new(spec).is_absolute() {
            PathBuf::from(spec)
        } else {
            base_dir.join(spec)
        };
        let target = normalize_lexically(&joined);

        if fs.is_file(&target) {
            return target;
        }
        for ext in &self.extensions {
            let candidate = with_suffix(&target, ext);
            if fs.is_file(&candidate) {
                return candidate;
            }
        }
        if fs.is_dir(&target) {
            for index in &self.index_files {
                for ext in &self.extensions {
                    let candidate = target.join(format!("{index}{ext}"));
                    if fs.is_file(&candidate) {
                        return candidate;
                    }
                }
            }
        }

        match (target.extension(), self.extensions.first()) {
            (None, Some(ext)) => with_suffix(&target, ext),
            _ => target,
        }
    }
}

impl StaticResolver for RegexResolver {
    fn resolve(&self, fs: &dyn FileSystem, path: &Path) -> std::result::Result<Vec<PathBuf>, ResolveError> {
        let content = fs.read_to_string(path).map_err(|err| classify_read_error(path, err))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut refs: Vec<PathBuf> = Vec::new();
        for spec in self.specifiers(&content) {
            if !is_local(spec) {
                continue;
            }
            let resolved = self.resolve_specifier(fs, base_dir, spec);
            if !refs.contains(&resolved) {
                refs.push(resolved);
            }
        }

        trace!(?path, ?refs, "resolved references");
        Ok(refs)
    }
}

fn is_local(spec: &str) -> bool {
    spec == "."
        || spec == ".."
        || spec.starts_with("./")
        || spec.starts_with("../")
        || spec.starts_with('/')
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn classify_read_error(path: &Path, err: anyhow::Error) -> ResolveError {
    let bad_encoding = err.chain().any(|cause| {
        cause.is::<FromUtf8Error>()
            || cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::InvalidData)
    });

    if bad_encoding {
        ResolveError::Parse {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        }
    } else {
        ResolveError::Read {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        }
    }
}
