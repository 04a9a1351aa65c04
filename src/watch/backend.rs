// src/watch/backend.rs

//! Pluggable watch backend abstraction.
//!
//! The watch manager talks to a `WatchBackend` instead of `notify` directly.
//! Production code uses [`super::NotifyBackend`]; tests use
//! [`super::MockWatchBackend`] and inject raw events themselves.

use std::fmt::Debug;

use crate::errors::WatchError;

use super::WatchTarget;

/// Trait abstracting the OS-level subscription mechanism.
///
/// Calls are balanced: every successful `watch` is eventually matched by one
/// `unwatch` of the same target, or by `close`.
pub trait WatchBackend: Send + Debug {
    fn watch(&mut self, target: &WatchTarget) -> Result<(), WatchError>;

    fn unwatch(&mut self, target: &WatchTarget) -> Result<(), WatchError>;

    /// Tear down every subscription. Returns once all of them are closed.
    fn close(&mut self) -> Result<(), WatchError>;
}
