use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use depwatch::listeners::{DepEvent, EventKind, ListenerRegistry};

fn counter(registry: &ListenerRegistry, kind: EventKind) -> (Arc<AtomicUsize>, depwatch::Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let sub = registry.subscribe(
        kind,
        Arc::new(move |_: &DepEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (count, sub)
}

fn update() -> DepEvent {
    DepEvent::Update(vec![PathBuf::from("/proj/a.js")])
}

#[test]
fn events_reach_only_their_channel() {
    let registry = ListenerRegistry::new();
    let (updates, _u) = counter(&registry, EventKind::Update);
    let (adds, _a) = counter(&registry, EventKind::Add);

    registry.emit(&update());
    registry.emit(&update());
    registry.emit(&DepEvent::Add(PathBuf::from("/proj/b.js")));
    registry.emit(&DepEvent::Remove(PathBuf::from("/proj/b.js")));

    assert_eq!(updates.load(Ordering::SeqCst), 2);
    assert_eq!(adds.load(Ordering::SeqCst), 1);
}

#[test]
fn handlers_run_in_registration_order() {
    let registry = ListenerRegistry::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut subs = Vec::new();
    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        subs.push(registry.subscribe(
            EventKind::Update,
            Arc::new(move |_: &DepEvent| order.lock().unwrap().push(tag)),
        ));
    }

    registry.emit(&update());
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn unsubscribe_removes_exactly_one_registration() {
    let registry = ListenerRegistry::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handler = {
        let count = Arc::clone(&count);
        Arc::new(move |_: &DepEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    };

    // The same handler registered twice counts as two registrations.
    let first = registry.subscribe(EventKind::Update, handler.clone());
    let _second = registry.subscribe(EventKind::Update, handler);
    assert_eq!(registry.listener_count(EventKind::Update), 2);

    first.unsubscribe();
    first.unsubscribe();
    assert_eq!(registry.listener_count(EventKind::Update), 1);

    registry.emit(&update());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_may_unsubscribe_itself_while_running() {
    let registry = ListenerRegistry::new();
    let slot: Arc<Mutex<Option<depwatch::Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = {
        let slot = Arc::clone(&slot);
        let calls = Arc::clone(&calls);
        registry.subscribe(
            EventKind::Update,
            Arc::new(move |_: &DepEvent| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            }),
        )
    };
    *slot.lock().unwrap() = Some(sub);

    registry.emit(&update());
    registry.emit(&update());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn closed_registry_is_silent() {
    let registry = ListenerRegistry::new();
    let (updates, sub) = counter(&registry, EventKind::Update);

    registry.close();
    assert!(registry.is_closed());
    registry.emit(&update());
    assert_eq!(updates.load(Ordering::SeqCst), 0);

    // Late subscriptions are inert and unsubscribing after close is harmless.
    let (late, late_sub) = counter(&registry, EventKind::Update);
    registry.emit(&update());
    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert_eq!(registry.listener_count(EventKind::Update), 0);
    late_sub.unsubscribe();
    sub.unsubscribe();
}

#[test]
fn handler_subscribing_while_close_waits_does_not_deadlock() {
    let registry = ListenerRegistry::new();
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let resume_rx = Mutex::new(resume_rx);
    let late: Arc<Mutex<Option<depwatch::Subscription>>> = Arc::new(Mutex::new(None));

    let _sub = {
        let inner = registry.clone();
        let late = Arc::clone(&late);
        registry.subscribe(
            EventKind::Update,
            Arc::new(move |_: &DepEvent| {
                entered_tx.send(()).unwrap();
                resume_rx.lock().unwrap().recv().unwrap();
                let sub = inner.subscribe(EventKind::Add, Arc::new(|_: &DepEvent| {}));
                *late.lock().unwrap() = Some(sub);
            }),
        )
    };

    let emitter = {
        let registry = registry.clone();
        thread::spawn(move || registry.emit(&update()))
    };
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("handler should start");

    let closer = {
        let registry = registry.clone();
        thread::spawn(move || registry.close())
    };
    // Let `close` start waiting for the dispatch in progress.
    thread::sleep(Duration::from_millis(50));
    resume_tx.send(()).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        emitter.join().unwrap();
        closer.join().unwrap();
        let _ = done_tx.send(());
    });
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("emit and close should both finish");

    assert!(registry.is_closed());
    assert_eq!(registry.listener_count(EventKind::Add), 0);
    assert!(late.lock().unwrap().is_some());
}
