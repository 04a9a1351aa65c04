// src/config/mod.rs

//! Configuration loading and validation for depwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate patterns and limits before anything is watched (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{anchor_spec, ConfigFile, RawConfigFile, ResolverSection, WatchSection};
