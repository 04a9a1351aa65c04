// src/config/validate.rs

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::entry::is_glob;
use crate::errors::{DepwatchError, Result};

/// Longest accepted settle or retry delay.
pub const MAX_DELAY_MS: u64 = 10_000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DepwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.resolver))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_entries(cfg)?;
    validate_delays(cfg)?;
    validate_resolver(cfg)?;
    Ok(())
}

fn validate_entries(cfg: &RawConfigFile) -> Result<()> {
    for spec in &cfg.watch.entries {
        if spec.trim().is_empty() {
            return Err(DepwatchError::ConfigError(
                "[watch].entries must not contain empty strings".to_string(),
            ));
        }
        if is_glob(spec) {
            Glob::new(spec).map_err(|e| DepwatchError::Pattern {
                pattern: spec.clone(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}

fn validate_delays(cfg: &RawConfigFile) -> Result<()> {
    for (key, value) in [
        ("settle_ms", cfg.watch.settle_ms),
        ("retry_ms", cfg.watch.retry_ms),
    ] {
        if value > MAX_DELAY_MS {
            return Err(DepwatchError::ConfigError(format!(
                "[watch].{key} must be <= {MAX_DELAY_MS} (got {value})"
            )));
        }
    }
    Ok(())
}

fn validate_resolver(cfg: &RawConfigFile) -> Result<()> {
    for pattern in cfg.resolver.patterns.iter().flatten() {
        let regex = Regex::new(pattern).map_err(|e| {
            DepwatchError::ConfigError(format!("[resolver].patterns: invalid regex '{pattern}': {e}"))
        })?;
        if regex.captures_len() < 2 {
            return Err(DepwatchError::ConfigError(format!(
                "[resolver].patterns: '{pattern}' has no capture group"
            )));
        }
    }

    for ext in cfg.resolver.extensions.iter().flatten() {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(DepwatchError::ConfigError(format!(
                "[resolver].extensions: '{ext}' must start with '.'"
            )));
        }
    }

    if let Some(index_files) = &cfg.resolver.index_files
        && index_files.iter().any(|name| name.is_empty() || name.contains('/'))
    {
        return Err(DepwatchError::ConfigError(
            "[resolver].index_files must be plain file stems".to_string(),
        ));
    }
    Ok(())
}
