// src/config/model.rs

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::entry::EntrySpec;
use crate::resolver::ResolverSettings;
use crate::types::{CaseSetting, SettlePolicy, WatchOptions};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// entries = ["src/main.js", "src/pages/*.js"]
/// case_sensitive = "auto"
/// settle_ms = 50
/// retry_ms = 100
/// rescan_ms = 0
///
/// [resolver]
/// extensions = [".js", ".mjs"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub resolver: ResolverSection,
}

/// Validated configuration. Only constructed through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub resolver: ResolverSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Entry specifications: literal paths or glob patterns. Relative ones
    /// are taken relative to the directory holding the config file.
    #[serde(default)]
    pub entries: Vec<String>,

    /// `"auto"`, `"sensitive"` or `"insensitive"`.
    #[serde(default)]
    pub case_sensitive: CaseSetting,

    /// Delay before resolving a freshly created file.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Delay before the single retry of a failed fresh resolution.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Periodic rescan interval; 0 disables it.
    #[serde(default)]
    pub rescan_ms: u64,
}

fn default_settle_ms() -> u64 {
    50
}

fn default_retry_ms() -> u64 {
    100
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            case_sensitive: CaseSetting::default(),
            settle_ms: default_settle_ms(),
            retry_ms: default_retry_ms(),
            rescan_ms: 0,
        }
    }
}

/// `[resolver]` section. Unset keys keep the built-in defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResolverSection {
    /// Regexes whose first capture group is a reference specifier.
    #[serde(default)]
    pub patterns: Option<Vec<String>>,

    /// Extensions tried, in order, for specifiers without one.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// File stems tried inside a directory specifier.
    #[serde(default)]
    pub index_files: Option<Vec<String>>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, resolver: ResolverSection) -> Self {
        Self { watch, resolver }
    }

    /// Runtime options, with `case_override` (from the command line) taking
    /// precedence over the file.
    pub fn watch_options(&self, case_override: Option<CaseSetting>) -> WatchOptions {
        let case = case_override.unwrap_or(self.watch.case_sensitive);
        WatchOptions {
            case_sensitivity: case.resolve(),
            settle: SettlePolicy {
                settle_delay: Duration::from_millis(self.watch.settle_ms),
                retry_delay: Duration::from_millis(self.watch.retry_ms),
            },
            rescan_interval: (self.watch.rescan_ms > 0)
                .then(|| Duration::from_millis(self.watch.rescan_ms)),
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        let mut settings = ResolverSettings::default();
        if let Some(patterns) = &self.resolver.patterns {
            settings.patterns = patterns.clone();
        }
        if let Some(extensions) = &self.resolver.extensions {
            settings.extensions = extensions.clone();
        }
        if let Some(index_files) = &self.resolver.index_files {
            settings.index_files = index_files.clone();
        }
        settings
    }

    /// Entry specifications anchored at `base_dir`.
    pub fn entry_specs(&self, base_dir: &Path) -> Vec<EntrySpec> {
        self.watch
            .entries
            .iter()
            .map(|spec| anchor_spec(base_dir, spec))
            .collect()
    }
}

/// Parse `spec` and make it absolute relative to `base_dir`.
pub fn anchor_spec(base_dir: &Path, spec: &str) -> EntrySpec {
    EntrySpec::parse(spec).anchored(base_dir)
}
