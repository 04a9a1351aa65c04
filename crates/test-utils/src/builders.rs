#![allow(dead_code)]

use std::path::{Path, PathBuf};

use depwatch::config::{ConfigFile, RawConfigFile};
use depwatch::fs::mock::MockFileSystem;
use depwatch::types::CaseSetting;

/// Root directory of every [`FixtureTree`].
pub const ROOT: &str = "/proj";

/// Builder for an in-memory project of JavaScript-style modules.
///
/// Paths are given relative to [`ROOT`]; references are written as
/// `require('<spec>')` lines so the default resolver picks them up.
#[derive(Debug, Clone)]
pub struct FixtureTree {
    fs: MockFileSystem,
    root: PathBuf,
}

impl FixtureTree {
    pub fn new() -> Self {
        Self {
            fs: MockFileSystem::new(),
            root: PathBuf::from(ROOT),
        }
    }

    pub fn case_insensitive() -> Self {
        Self {
            fs: MockFileSystem::case_insensitive(),
            root: PathBuf::from(ROOT),
        }
    }

    pub fn module(self, rel: &str, refs: &[&str]) -> Self {
        self.write_module(rel, refs);
        self
    }

    pub fn file(self, rel: &str, content: &str) -> Self {
        self.fs.add_file(self.path(rel), content);
        self
    }

    /// (Re)write a module with the given references.
    pub fn write_module(&self, rel: &str, refs: &[&str]) {
        self.fs.add_file(self.path(rel), module_source(refs));
    }

    pub fn write_raw(&self, rel: &str, content: impl Into<Vec<u8>>) {
        self.fs.add_file(self.path(rel), content);
    }

    pub fn remove(&self, rel: &str) -> bool {
        self.fs.remove_file(self.path(rel))
    }

    pub fn rename(&self, from: &str, to: &str) {
        self.fs
            .rename(self.path(from), self.path(to))
            .expect("fixture rename");
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Absolute entry specification for `rel` (literal or glob).
    pub fn spec(&self, rel: &str) -> String {
        format!("{}/{}", ROOT, rel)
    }

    /// Render `path` relative to the root.
    pub fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub fn fs(&self) -> MockFileSystem {
        self.fs.clone()
    }
}

impl Default for FixtureTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Source text referencing each of `refs`.
pub fn module_source(refs: &[&str]) -> String {
    let mut out = String::new();
    for (i, spec) in refs.iter().enumerate() {
        out.push_str(&format!("const dep{i} = require('{spec}');\n"));
    }
    out.push_str("module.exports = {};\n");
    out
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn entry(mut self, spec: &str) -> Self {
        self.config.watch.entries.push(spec.to_string());
        self
    }

    pub fn case_sensitive(mut self, setting: CaseSetting) -> Self {
        self.config.watch.case_sensitive = setting;
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.watch.settle_ms = ms;
        self
    }

    pub fn rescan_ms(mut self, ms: u64) -> Self {
        self.config.watch.rescan_ms = ms;
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.config.resolver.extensions = Some(exts.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn pattern(mut self, regex: &str) -> Self {
        self.config
            .resolver
            .patterns
            .get_or_insert_with(Vec::new)
            .push(regex.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
