// src/engine/runtime.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::listeners::ListenerRegistry;
use crate::types::SettlePolicy;
use crate::watch::RawEvent;

use super::core::PropagationEngine;
use super::EngineStep;

/// Async shell around [`PropagationEngine`].
///
/// Reads raw events from the backend channel, applies the settle delay to
/// freshly created paths, performs the single retry, runs periodic rescans
/// and hands every resulting notification to the listener registry. The
/// engine lock is never held while waiting or while handlers run.
///
/// A step that reports a failed watch ends the loop: its errors are
/// delivered, then listeners are closed and the backend is shut down.
pub struct Reactor {
    engine: Arc<Mutex<PropagationEngine>>,
    listeners: ListenerRegistry,
    events: mpsc::UnboundedReceiver<RawEvent>,
    shutdown: watch::Receiver<bool>,
    stopped: watch::Sender<bool>,
    settle: SettlePolicy,
    rescan_interval: Option<Duration>,
    halted: bool,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("settle", &self.settle)
            .field("rescan_interval", &self.rescan_interval)
            .finish_non_exhaustive()
    }
}

pub(crate) fn lock_engine(engine: &Mutex<PropagationEngine>) -> MutexGuard<'_, PropagationEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Reactor {
    pub fn new(
        engine: Arc<Mutex<PropagationEngine>>,
        listeners: ListenerRegistry,
        events: mpsc::UnboundedReceiver<RawEvent>,
        shutdown: watch::Receiver<bool>,
        stopped: watch::Sender<bool>,
        settle: SettlePolicy,
        rescan_interval: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            listeners,
            events,
            shutdown,
            stopped,
            settle,
            rescan_interval,
            halted: false,
        }
    }

    /// Main event loop. Returns when shutdown is signalled, the backend
    /// channel closes or a watch fails; `stopped` is set on the way out.
    pub async fn run(mut self) {
        info!("depwatch reactor started");

        let mut rescan = self.rescan_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    debug!("shutdown signalled");
                    break;
                }
                raw = self.events.recv() => match raw {
                    Some(raw) => self.handle_raw(raw).await,
                    None => {
                        info!("raw event channel closed; exiting");
                        break;
                    }
                },
                _ = next_tick(&mut rescan) => {
                    let step = lock_engine(&self.engine).rescan();
                    self.finish(step).await;
                }
            }
            if self.halted {
                break;
            }
        }

        let _ = self.stopped.send(true);
        info!("depwatch reactor exiting");
    }

    async fn handle_raw(&mut self, raw: RawEvent) {
        debug!(?raw, "raw event");
        if raw == RawEvent::Rescan {
            let step = lock_engine(&self.engine).rescan();
            self.finish(step).await;
            return;
        }

        let changes = lock_engine(&self.engine).classify(&raw);
        for change in changes {
            if change.is_appearance() && !self.settle.settle_delay.is_zero() {
                tokio::time::sleep(self.settle.settle_delay).await;
            }
            if self.listeners.is_closed() {
                return;
            }
            let step = lock_engine(&self.engine).apply(change);
            self.finish(step).await;
            if self.halted {
                return;
            }
        }
    }

    /// Dispatch a step, then run its retries (each at most once).
    async fn finish(&mut self, mut step: EngineStep) {
        let retries = std::mem::take(&mut step.retries);
        let fatal = step.fatal;
        self.dispatch(step);
        if fatal {
            self.teardown().await;
            return;
        }

        for path in retries {
            tokio::time::sleep(self.settle.retry_delay).await;
            if self.listeners.is_closed() {
                return;
            }
            let mut retried = lock_engine(&self.engine).retry(&path);
            retried.retries.clear();
            let fatal = retried.fatal;
            self.dispatch(retried);
            if fatal {
                self.teardown().await;
                return;
            }
        }
    }

    async fn teardown(&mut self) {
        self.halted = true;
        self.listeners.close();
        let backend = lock_engine(&self.engine).shutdown();
        let Some(mut backend) = backend else {
            return;
        };
        match tokio::task::spawn_blocking(move || backend.close()).await {
            Ok(Ok(())) => info!("watch backend closed after failure"),
            Ok(Err(err)) => warn!(error = %err, "closing watch backend"),
            Err(err) => warn!(error = %err, "backend close task ended abnormally"),
        }
    }

    fn dispatch(&self, step: EngineStep) {
        for event in &step.events {
            self.listeners.emit(event);
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
