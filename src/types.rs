use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// How path identity is compared.
///
/// On a case-insensitive filesystem `src/App.js` and `src/app.js` name the
/// same file, so every map keyed by path goes through [`PathKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Platform default: macOS and Windows volumes are case-insensitive
    /// out of the box, everything else is treated as case-sensitive.
    pub fn detect() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        }
    }

    pub fn key(self, path: &Path) -> PathKey {
        PathKey::new(path, self)
    }
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        CaseSensitivity::detect()
    }
}

/// Case handling as written in configuration or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaseSetting {
    /// Use the platform default, see [`CaseSensitivity::detect`].
    #[default]
    Auto,
    Sensitive,
    Insensitive,
}

impl CaseSetting {
    pub fn resolve(self) -> CaseSensitivity {
        match self {
            CaseSetting::Auto => CaseSensitivity::detect(),
            CaseSetting::Sensitive => CaseSensitivity::Sensitive,
            CaseSetting::Insensitive => CaseSensitivity::Insensitive,
        }
    }
}

/// Normalized identity of a path.
///
/// Two paths with equal keys are the same file as far as the register and
/// the watch table are concerned.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(PathBuf);

impl PathKey {
    pub fn new(path: &Path, case: CaseSensitivity) -> Self {
        match case {
            CaseSensitivity::Sensitive => PathKey(path.to_path_buf()),
            CaseSensitivity::Insensitive => {
                PathKey(PathBuf::from(path.to_string_lossy().to_lowercase()))
            }
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Wait-and-retry policy for paths that just appeared.
///
/// A directory notification can arrive before the new file is fully
/// written. The reactor waits `settle_delay` before resolving an appeared
/// path and retries a failed resolution exactly once after `retry_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub settle_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Runtime options for a [`crate::DepWatch`] instance.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub case_sensitivity: CaseSensitivity,
    pub settle: SettlePolicy,
    /// Periodically re-poll every entry specification. `None` relies on
    /// filesystem notifications alone.
    pub rescan_interval: Option<Duration>,
}
