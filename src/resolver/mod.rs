// src/resolver/mod.rs

//! Static reference extraction.
//!
//! A [`StaticResolver`] looks at one file and lists the local paths it
//! references, without executing anything. The graph builder calls it once
//! per file per build pass; everything else about the host module system is
//! out of scope.

pub mod references;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::errors::ResolveError;
use crate::fs::FileSystem;

pub use references::{RegexResolver, ResolverSettings};

/// Trait abstracting how a file's immediate references are discovered.
///
/// Production code uses [`RegexResolver`]; tests may provide a table-driven
/// implementation.
pub trait StaticResolver: Send + Sync + Debug {
    /// Return the immediate local references of `path`, deduplicated.
    ///
    /// A reference may point at a file that does not exist (yet); the graph
    /// records it as dangling and picks it up when it appears.
    fn resolve(&self, fs: &dyn FileSystem, path: &Path) -> Result<Vec<PathBuf>, ResolveError>;
}
