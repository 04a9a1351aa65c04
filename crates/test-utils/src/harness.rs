#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use depwatch::engine::PropagationEngine;
use depwatch::entry::{EntryResolver, EntrySpec};
use depwatch::fs::FileSystem;
use depwatch::resolver::{RegexResolver, StaticResolver};
use depwatch::types::{CaseSensitivity, SettlePolicy, WatchOptions};
use depwatch::watch::{MockWatchBackend, RawEvent, WatchBackend};
use depwatch::{DepEvent, DepWatch, DepwatchError, EventKind, Subscription};
use tokio::sync::mpsc;

use crate::builders::FixtureTree;
use crate::with_timeout;

/// Synchronous engine over a [`FixtureTree`] and a mock backend.
///
/// Events are applied immediately and retries are performed on the spot, so
/// tests see the full outcome of each filesystem change.
pub struct EngineHarness {
    pub tree: FixtureTree,
    pub backend: MockWatchBackend,
    pub engine: PropagationEngine,
    pub warnings: Vec<Arc<DepwatchError>>,
}

impl EngineHarness {
    pub fn start(tree: FixtureTree, specs: &[&str]) -> Result<Self, DepwatchError> {
        let backend = MockWatchBackend::new();
        Self::start_with_backend(tree, specs, backend)
    }

    pub fn start_with_backend(
        tree: FixtureTree,
        specs: &[&str],
        backend: MockWatchBackend,
    ) -> Result<Self, DepwatchError> {
        let case = tree.fs().case();
        let specs: Vec<EntrySpec> = specs.iter().map(|s| EntrySpec::parse(&tree.spec(s))).collect();
        let entries = EntryResolver::new(&specs, case)?;
        let fs: Arc<dyn FileSystem> = Arc::new(tree.fs());
        let resolver: Arc<dyn StaticResolver> = Arc::new(RegexResolver::default());
        let mut engine = PropagationEngine::new(
            entries,
            fs,
            resolver,
            Box::new(backend.clone()) as Box<dyn WatchBackend>,
            case,
        );
        let warnings = engine.initialize()?;
        Ok(Self {
            tree,
            backend,
            engine,
            warnings,
        })
    }

    /// Apply a raw event, then any retries it scheduled.
    pub fn send(&mut self, raw: RawEvent) -> Vec<DepEvent> {
        let mut step = self.engine.step(raw);
        let retries = std::mem::take(&mut step.retries);
        let mut events = step.events;
        for path in retries {
            events.extend(self.engine.retry(&path).events);
        }
        events
    }

    pub fn modify(&mut self, rel: &str, refs: &[&str]) -> Vec<String> {
        self.tree.write_module(rel, refs);
        let events = self.send(RawEvent::Modified(self.tree.path(rel)));
        self.summarize(&events)
    }

    pub fn touch(&mut self, rel: &str) -> Vec<String> {
        let events = self.send(RawEvent::Modified(self.tree.path(rel)));
        self.summarize(&events)
    }

    pub fn create(&mut self, rel: &str, refs: &[&str]) -> Vec<String> {
        self.tree.write_module(rel, refs);
        let events = self.send(RawEvent::Created(self.tree.path(rel)));
        self.summarize(&events)
    }

    pub fn delete(&mut self, rel: &str) -> Vec<String> {
        assert!(self.tree.remove(rel), "fixture file {rel} missing");
        let events = self.send(RawEvent::Removed(self.tree.path(rel)));
        self.summarize(&events)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Vec<String> {
        self.tree.rename(from, to);
        let events = self.send(RawEvent::Renamed {
            from: self.tree.path(from),
            to: self.tree.path(to),
        });
        self.summarize(&events)
    }

    pub fn ids(&self) -> Vec<String> {
        self.engine.ids().iter().map(|p| self.tree.rel(p)).collect()
    }

    /// Registered paths, relative and sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .engine
            .register()
            .keys()
            .map(|p| self.tree.rel(p))
            .collect();
        paths.sort();
        paths
    }

    pub fn owners(&self, rel: &str) -> Vec<String> {
        self.engine
            .graph()
            .owners(&self.tree.path(rel))
            .iter()
            .map(|p| self.tree.rel(p))
            .collect()
    }

    pub fn is_watching(&self, rel: &str) -> bool {
        self.backend.is_watching(&depwatch::watch::WatchTarget::File(self.tree.path(rel)))
    }

    pub fn summarize(&self, events: &[DepEvent]) -> Vec<String> {
        events.iter().map(|e| describe(&self.tree, e)).collect()
    }
}

/// One-line rendering of an event, paths relative to the fixture root.
pub fn describe(tree: &FixtureTree, event: &DepEvent) -> String {
    match event {
        DepEvent::Update(ids) => {
            let ids: Vec<String> = ids.iter().map(|p| tree.rel(p)).collect();
            format!("update {}", ids.join(" "))
        }
        DepEvent::Add(id) => format!("add {}", tree.rel(id)),
        DepEvent::Remove(id) => format!("remove {}", tree.rel(id)),
        DepEvent::Error(err) => format!("error {err}"),
    }
}

/// Options without settle delay and with a short retry delay.
pub fn fast_options(case: CaseSensitivity) -> WatchOptions {
    WatchOptions {
        case_sensitivity: case,
        settle: SettlePolicy {
            settle_delay: Duration::ZERO,
            retry_delay: Duration::from_millis(10),
        },
        rescan_interval: None,
    }
}

/// A running [`DepWatch`] over a fixture tree with events injected by hand.
pub struct LiveHarness {
    pub tree: FixtureTree,
    pub backend: MockWatchBackend,
    pub tx: mpsc::UnboundedSender<RawEvent>,
    pub watch: DepWatch,
}

impl LiveHarness {
    /// Must be called from within a Tokio runtime.
    pub fn start(tree: FixtureTree, specs: &[&str], options: WatchOptions) -> Result<Self, DepwatchError> {
        let backend = MockWatchBackend::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let specs: Vec<String> = specs.iter().map(|s| tree.spec(s)).collect();
        let watch = DepWatch::builder(specs)
            .options(options)
            .file_system(Arc::new(tree.fs()))
            .backend(Box::new(backend.clone()), rx)
            .build()?;
        Ok(Self {
            tree,
            backend,
            tx,
            watch,
        })
    }

    pub fn send(&self, raw: RawEvent) {
        self.tx.send(raw).expect("reactor stopped");
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.tree.path(rel)
    }
}

/// Collects every event delivered to a [`DepWatch`].
pub struct EventRecorder {
    rx: mpsc::UnboundedReceiver<DepEvent>,
    subscriptions: Vec<Subscription>,
}

impl EventRecorder {
    pub fn attach(watch: &DepWatch) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = [EventKind::Update, EventKind::Add, EventKind::Remove, EventKind::Error]
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                watch.on(kind, move |event: &DepEvent| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        Self { rx, subscriptions }
    }

    pub async fn next(&mut self) -> DepEvent {
        with_timeout(self.rx.recv())
            .await
            .expect("event channel closed")
    }

    /// Next `n` events.
    pub async fn take(&mut self, n: usize) -> Vec<DepEvent> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next().await);
        }
        out
    }

    /// Assert that nothing arrives for `window`.
    pub async fn expect_quiet(&mut self, window: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(window, self.rx.recv()).await {
            panic!("unexpected event: {event:?}");
        }
    }

    pub fn detach(&self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
    }
}
