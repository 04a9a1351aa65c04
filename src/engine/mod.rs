// src/engine/mod.rs

//! Propagation engine for depwatch.
//!
//! This module ties together:
//! - entry resolution (which files are entries, now and later)
//! - the dependency graph and register
//! - the watch manager
//! - the reactor loop that reacts to:
//!   - raw filesystem events
//!   - settle/retry timers for freshly created files
//!   - periodic rescans
//!   - shutdown signals
//!
//! The pure, synchronous state machine lives in [`core`] with its handlers in
//! [`event_handlers`]; the async shell is implemented in [`runtime`].

pub mod core;
pub mod event_handlers;
pub mod runtime;

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::DepwatchError;
use crate::listeners::DepEvent;

pub use self::core::PropagationEngine;
pub use self::runtime::Reactor;

/// Output of one engine step.
#[derive(Debug, Default)]
pub struct EngineStep {
    /// Notifications in emission order.
    pub events: Vec<DepEvent>,
    /// Freshly appeared paths whose resolution failed and should be tried
    /// once more after the retry delay.
    pub retries: Vec<PathBuf>,
    /// A registered path could not be watched. The engine has halted and
    /// the instance must stop.
    pub fatal: bool,
}

impl EngineStep {
    pub fn error(&mut self, err: impl Into<DepwatchError>) {
        self.events.push(DepEvent::Error(Arc::new(err.into())));
    }

    /// Record an error the instance cannot continue after.
    pub fn fail(&mut self, err: impl Into<DepwatchError>) {
        self.error(err);
        self.fatal = true;
    }

    pub fn schedule_retry(&mut self, path: PathBuf) {
        if !self.retries.contains(&path) {
            self.retries.push(path);
        }
    }

    pub fn merge(&mut self, other: EngineStep) {
        self.events.extend(other.events);
        self.fatal |= other.fatal;
        for path in other.retries {
            self.schedule_retry(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.retries.is_empty()
    }
}
