// src/depwatch.rs

//! Public facade: one live dependency watcher.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::runtime::lock_engine;
use crate::engine::{PropagationEngine, Reactor};
use crate::entry::{EntryResolver, EntrySpec};
use crate::errors::{DepwatchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{export, RegisterEntry};
use crate::listeners::{DepEvent, EventKind, ListenerRegistry, Subscription};
use crate::resolver::{RegexResolver, StaticResolver};
use crate::types::WatchOptions;
use crate::watch::{NotifyBackend, RawEvent, WatchBackend};

/// A running watcher over a set of entry specifications.
///
/// Must be created inside a Tokio runtime: the reactor is spawned onto it.
pub struct DepWatch {
    engine: Arc<Mutex<PropagationEngine>>,
    listeners: ListenerRegistry,
    shutdown_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
    reactor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    startup_errors: Vec<Arc<DepwatchError>>,
}

impl std::fmt::Debug for DepWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepWatch")
            .field("closed", &self.is_closed())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl DepWatch {
    pub fn builder<I, S>(specs: I) -> DepWatchBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<EntrySpec>,
    {
        DepWatchBuilder {
            specs: specs.into_iter().map(Into::into).collect(),
            options: WatchOptions::default(),
            fs: None,
            resolver: None,
            backend: None,
        }
    }

    /// Start watching with the real filesystem, the default resolver and
    /// the platform watcher.
    pub fn start<I, S>(specs: I, options: WatchOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<EntrySpec>,
    {
        Self::builder(specs).options(options).build()
    }

    /// Attach a handler to one event channel.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&DepEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(kind, Arc::new(handler))
    }

    /// Active entry ids, sorted.
    pub fn ids(&self) -> Vec<PathBuf> {
        lock_engine(&self.engine).ids()
    }

    /// Every registered path with the entries that reach it.
    pub fn register(&self) -> BTreeMap<PathBuf, RegisterEntry> {
        lock_engine(&self.engine).register()
    }

    /// Entry specifications currently matching no active entry.
    pub fn pending(&self) -> Vec<String> {
        lock_engine(&self.engine).pending()
    }

    /// Graphviz rendering of the current graph.
    pub fn to_dot(&self) -> String {
        export::to_dot(lock_engine(&self.engine).graph())
    }

    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        export::cycles(lock_engine(&self.engine).graph())
    }

    /// Resolution failures hit while building the initial graph.
    pub fn startup_errors(&self) -> &[Arc<DepwatchError>] {
        &self.startup_errors
    }

    /// True after `close` or once the instance stopped on its own.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || *self.stopped_rx.borrow()
    }

    /// Resolves once the reactor has stopped: after `close`, or after a
    /// watch failure the instance could not continue from.
    pub async fn stopped(&self) {
        let mut stopped = self.stopped_rx.clone();
        let _ = stopped.wait_for(|done| *done).await;
    }

    /// Stop watching: listeners are dropped first so no event fires after
    /// this is called, then the reactor stops and every subscription is
    /// torn down. A second call does nothing and succeeds.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.listeners.close();
        let _ = self.shutdown_tx.send(true);

        let reactor = self
            .reactor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reactor
            && let Err(err) = handle.await
        {
            warn!(error = %err, "reactor task ended abnormally");
        }

        let backend = lock_engine(&self.engine).shutdown();
        if let Some(mut backend) = backend {
            tokio::task::spawn_blocking(move || backend.close())
                .await
                .map_err(|e| DepwatchError::Other(e.into()))??;
        }

        info!("depwatch closed");
        Ok(())
    }
}

/// Configures a [`DepWatch`]. Anything left unset uses the production
/// implementation.
pub struct DepWatchBuilder {
    specs: Vec<EntrySpec>,
    options: WatchOptions,
    fs: Option<Arc<dyn FileSystem>>,
    resolver: Option<Arc<dyn StaticResolver>>,
    backend: Option<(Box<dyn WatchBackend>, mpsc::UnboundedReceiver<RawEvent>)>,
}

impl DepWatchBuilder {
    pub fn options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn StaticResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use `backend` for subscriptions and read raw events from `events`.
    pub fn backend(
        mut self,
        backend: Box<dyn WatchBackend>,
        events: mpsc::UnboundedReceiver<RawEvent>,
    ) -> Self {
        self.backend = Some((backend, events));
        self
    }

    /// Build the initial graph and spawn the reactor.
    ///
    /// Relative specifications are anchored at the canonical working
    /// directory, since backends report absolute paths.
    pub fn build(self) -> Result<DepWatch> {
        let case = self.options.case_sensitivity;
        let fs = self.fs.unwrap_or_else(|| Arc::new(RealFileSystem));
        let specs = if self.specs.iter().any(EntrySpec::is_relative) {
            let cwd = fs.canonicalize(Path::new("."))?;
            debug!(?cwd, "anchoring relative entry specifications");
            self.specs.into_iter().map(|spec| spec.anchored(&cwd)).collect()
        } else {
            self.specs
        };
        let entries = EntryResolver::new(&specs, case)?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(RegexResolver::default()));
        let (backend, events) = match self.backend {
            Some(pair) => pair,
            None => {
                let (backend, events) = NotifyBackend::new()?;
                (Box::new(backend) as Box<dyn WatchBackend>, events)
            }
        };

        let mut engine = PropagationEngine::new(entries, fs, resolver, backend, case);
        let startup_errors = engine.initialize()?;
        let engine = Arc::new(Mutex::new(engine));

        let listeners = ListenerRegistry::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = watch::channel(false);
        let reactor = Reactor::new(
            Arc::clone(&engine),
            listeners.clone(),
            events,
            shutdown_rx,
            stopped_tx,
            self.options.settle,
            self.options.rescan_interval,
        );
        let handle = tokio::spawn(reactor.run());

        Ok(DepWatch {
            engine,
            listeners,
            shutdown_tx,
            stopped_rx,
            reactor: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
            startup_errors,
        })
    }
}
