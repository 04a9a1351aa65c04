// src/listeners.rs

//! Event channel fan-out.
//!
//! Handlers are stored per [`EventKind`] and invoked synchronously by the
//! reactor, outside the engine lock. Once the registry is closed no handler
//! runs again: `close` waits for an in-flight dispatch to finish before it
//! returns. Handlers may subscribe while `close` is waiting; they get an
//! inert subscription.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tracing::trace;

use crate::errors::DepwatchError;

/// Event channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Update,
    Add,
    Remove,
    Error,
}

/// Notification delivered to listeners.
#[derive(Debug, Clone)]
pub enum DepEvent {
    /// Entries whose closure contains the changed path, sorted, each once.
    Update(Vec<PathBuf>),
    /// A new entry became active.
    Add(PathBuf),
    /// An active entry stopped existing.
    Remove(PathBuf),
    Error(Arc<DepwatchError>),
}

impl DepEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DepEvent::Update(_) => EventKind::Update,
            DepEvent::Add(_) => EventKind::Add,
            DepEvent::Remove(_) => EventKind::Remove,
            DepEvent::Error(_) => EventKind::Error,
        }
    }
}

pub type Handler = Arc<dyn Fn(&DepEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(u64, Handler)>>,
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&EventKind, usize> =
            self.by_kind.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Handlers").field("by_kind", &counts).finish()
    }
}

/// Shared handler table. Clones refer to the same table.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    handlers: Arc<Mutex<Handlers>>,
    closed: Arc<AtomicBool>,
    /// Held for reading by `emit`, for writing by `close`.
    dispatch: Arc<RwLock<()>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn lock(handlers: &Mutex<Handlers>) -> MutexGuard<'_, Handlers> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. On a closed registry the handler is
    /// dropped and the returned subscription is inert.
    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription {
        let mut handlers = lock(&self.handlers);
        // `close` sets the flag before clearing under this lock.
        if self.is_closed() {
            return Subscription::inert(kind);
        }
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.by_kind.entry(kind).or_default().push((id, handler));
        Subscription {
            handlers: Arc::downgrade(&self.handlers),
            kind,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// The handler list is copied first so handlers may subscribe or
    /// unsubscribe while being called.
    pub fn emit(&self, event: &DepEvent) {
        let _dispatch = self.dispatch.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return;
        }
        let kind = event.kind();
        let targets: Vec<Handler> = lock(&self.handlers)
            .by_kind
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        trace!(?kind, listeners = targets.len(), "dispatching event");
        for handler in targets {
            handler(event);
        }
    }

    /// Drop every handler and refuse further dispatch.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _dispatch = self.dispatch.write().unwrap_or_else(PoisonError::into_inner);
        lock(&self.handlers).by_kind.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.handlers)
            .by_kind
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by `on`. Dropping it does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    handlers: Weak<Mutex<Handlers>>,
    kind: EventKind,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    fn inert(kind: EventKind) -> Self {
        Self {
            handlers: Weak::new(),
            kind,
            id: u64::MAX,
            active: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove exactly this registration. Further calls do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(handlers) = self.handlers.upgrade() else {
            return;
        };
        let mut handlers = lock(&handlers);
        if let Some(list) = handlers.by_kind.get_mut(&self.kind) {
            list.retain(|(id, _)| *id != self.id);
        }
    }
}
