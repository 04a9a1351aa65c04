// src/watch/classify.rs

//! Raw event classification.

use std::path::Path;

use tracing::trace;

use crate::fs::FileSystem;
use crate::types::CaseSensitivity;

use super::{FsChange, RawEvent};

/// Classify one raw event.
///
/// `is_tracked` answers whether a path is currently in the register.
/// Existence is checked through `fs` because backends disagree on what a
/// rename or an atomic save looks like: a "removed" tracked path that still
/// exists was replaced in place and counts as a content change.
pub fn classify(
    raw: &RawEvent,
    case: CaseSensitivity,
    fs: &dyn FileSystem,
    is_tracked: impl Fn(&Path) -> bool,
) -> Vec<FsChange> {
    let changes = match raw {
        RawEvent::Created(path) | RawEvent::Modified(path) | RawEvent::Moved(path) => {
            match (is_tracked(path), fs.is_file(path)) {
                (true, true) => vec![FsChange::Changed(path.clone())],
                (true, false) => vec![FsChange::Disappeared(path.clone())],
                (false, true) => vec![FsChange::Appeared(path.clone())],
                (false, false) => Vec::new(),
            }
        }
        RawEvent::Removed(path) => {
            if !is_tracked(path) {
                Vec::new()
            } else if fs.is_file(path) {
                vec![FsChange::Changed(path.clone())]
            } else {
                vec![FsChange::Disappeared(path.clone())]
            }
        }
        RawEvent::Renamed { from, to } => {
            if case == CaseSensitivity::Insensitive && case.key(from) == case.key(to) {
                if is_tracked(from) || is_tracked(to) {
                    vec![FsChange::RenamedCaseOnly {
                        from: from.clone(),
                        to: to.clone(),
                    }]
                } else {
                    Vec::new()
                }
            } else if is_tracked(from) || fs.is_file(to) {
                vec![FsChange::RenamedStructural {
                    from: from.clone(),
                    to: to.clone(),
                }]
            } else {
                Vec::new()
            }
        }
        RawEvent::Rescan => Vec::new(),
    };

    trace!(?raw, ?changes, "classified raw event");
    changes
}
