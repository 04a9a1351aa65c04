use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use depwatch::types::{CaseSensitivity, WatchOptions};
use depwatch::watch::mock::WatchCall;
use depwatch::watch::{MockWatchBackend, RawEvent, WatchTarget};
use depwatch::{DepEvent, DepWatch, EventKind};
use depwatch_test_utils::builders::FixtureTree;
use depwatch_test_utils::harness::{describe, fast_options, EventRecorder, LiveHarness};
use depwatch_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

const QUIET: Duration = Duration::from_millis(150);

fn shared_tree() -> FixtureTree {
    FixtureTree::new()
        .module("entries/a.js", &["../lib/shared"])
        .module("entries/b.js", &["../lib/shared"])
        .module("lib/shared.js", &["./util"])
        .module("lib/util.js", &[])
}

fn options() -> WatchOptions {
    fast_options(CaseSensitivity::Sensitive)
}

#[tokio::test]
async fn change_reaches_listeners() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], options())?;
    let mut rec = EventRecorder::attach(&h.watch);

    h.send(RawEvent::Modified(h.path("lib/util.js")));
    let event = rec.next().await;
    assert_eq!(describe(&h.tree, &event), "update entries/a.js entries/b.js");

    h.tree.write_module("entries/c.js", &["../lib/util"]);
    h.send(RawEvent::Created(h.path("entries/c.js")));
    assert_eq!(describe(&h.tree, &rec.next().await), "add entries/c.js");

    h.send(RawEvent::Modified(h.path("lib/util.js")));
    assert_eq!(
        describe(&h.tree, &rec.next().await),
        "update entries/a.js entries/b.js entries/c.js"
    );

    h.watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn queries_reflect_the_live_graph() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js", "missing/*.js"], options())?;

    let ids: Vec<String> = h.watch.ids().iter().map(|p| h.tree.rel(p)).collect();
    assert_eq!(ids, vec!["entries/a.js", "entries/b.js"]);

    let register = h.watch.register();
    assert_eq!(register.len(), 4);
    let util = &register[&h.path("lib/util.js")];
    assert_eq!(util.entries, vec![h.path("entries/a.js"), h.path("entries/b.js")]);

    assert_eq!(h.watch.pending(), vec!["/proj/missing/*.js"]);
    assert!(h.watch.cycles().is_empty());
    assert!(h.watch.startup_errors().is_empty());

    let dot = h.watch.to_dot();
    assert!(dot.starts_with("digraph"), "{dot}");
    assert!(dot.contains("lib/shared.js"), "{dot}");
    assert_eq!(dot.matches("->").count(), 3, "{dot}");

    h.watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn fresh_file_is_retried_once() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], options())?;
    let mut rec = EventRecorder::attach(&h.watch);

    h.tree.write_module("entries/c.js", &["../lib/util"]);
    h.tree.fs().fail_next_reads(h.path("entries/c.js"), 1);
    h.send(RawEvent::Created(h.path("entries/c.js")));

    let events = rec.take(2).await;
    let summary: Vec<String> = events.iter().map(|e| describe(&h.tree, e)).collect();
    assert_eq!(summary, vec!["add entries/c.js", "update entries/c.js"]);
    rec.expect_quiet(QUIET).await;

    h.watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn watch_failure_is_fatal() -> TestResult {
    init_tracing();
    let tree = shared_tree().module("lib/extra.js", &[]);
    let h = LiveHarness::start(tree, &["entries/*.js"], options())?;
    h.backend.fail_on(h.path("lib/extra.js"));
    let mut rec = EventRecorder::attach(&h.watch);

    h.tree.write_module("lib/util.js", &["./extra"]);
    h.send(RawEvent::Modified(h.path("lib/util.js")));

    match rec.next().await {
        DepEvent::Error(err) => assert!(err.to_string().contains("lib/extra.js"), "{err}"),
        other => panic!("expected error, got {other:?}"),
    }

    with_timeout(h.watch.stopped()).await;
    assert!(h.watch.is_closed());
    assert!(h.watch.register().is_empty());
    assert!(h.watch.ids().is_empty());
    assert!(h.backend.is_closed());
    assert!(h.backend.active().is_empty());

    let _ = h.tx.send(RawEvent::Modified(h.path("lib/shared.js")));
    rec.expect_quiet(QUIET).await;

    h.watch.close().await?;
    let closes = h
        .backend
        .calls()
        .iter()
        .filter(|c| **c == WatchCall::Close)
        .count();
    assert_eq!(closes, 1);
    Ok(())
}

#[tokio::test]
async fn relative_specs_are_anchored_at_the_working_directory() -> TestResult {
    init_tracing();
    let tree = shared_tree();
    let fs = tree.fs();
    fs.set_current_dir("/proj/lib/..");
    let backend = MockWatchBackend::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let watch = DepWatch::builder(["entries/*.js", "./lib/../entries/b.js"])
        .options(options())
        .file_system(Arc::new(fs))
        .backend(Box::new(backend.clone()), rx)
        .build()?;

    assert_eq!(watch.ids(), vec![tree.path("entries/a.js"), tree.path("entries/b.js")]);
    assert!(watch.register().contains_key(&tree.path("lib/util.js")));
    assert!(backend.is_watching(&WatchTarget::Dir(tree.path("entries"))));

    let mut rec = EventRecorder::attach(&watch);
    tx.send(RawEvent::Modified(tree.path("lib/util.js")))?;
    assert_eq!(
        describe(&tree, &rec.next().await),
        "update entries/a.js entries/b.js"
    );

    tree.write_module("entries/c.js", &[]);
    tx.send(RawEvent::Created(tree.path("entries/c.js")))?;
    assert_eq!(describe(&tree, &rec.next().await), "add entries/c.js");

    watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn unsubscribed_listener_hears_nothing() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], options())?;
    let mut muted = EventRecorder::attach(&h.watch);
    let mut live = EventRecorder::attach(&h.watch);
    muted.detach();
    muted.detach();

    h.send(RawEvent::Modified(h.path("lib/util.js")));
    assert!(matches!(live.next().await, DepEvent::Update(_)));
    muted.expect_quiet(QUIET).await;

    h.watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn close_is_idempotent_and_silences_everything() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], options())?;
    let mut rec = EventRecorder::attach(&h.watch);

    h.watch.close().await?;
    assert!(h.watch.is_closed());
    assert!(h.backend.is_closed());
    assert!(h.backend.active().is_empty());
    assert_eq!(h.backend.calls().last(), Some(&WatchCall::Close));

    h.watch.close().await?;
    let closes = h
        .backend
        .calls()
        .iter()
        .filter(|c| **c == WatchCall::Close)
        .count();
    assert_eq!(closes, 1);

    // The reactor is gone; the send may fail and nothing is delivered.
    let _ = h.tx.send(RawEvent::Modified(h.path("lib/util.js")));
    rec.expect_quiet(QUIET).await;

    let late = h.watch.on(EventKind::Update, |_| panic!("handler after close"));
    late.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn periodic_rescan_finds_unreported_entries() -> TestResult {
    init_tracing();
    let mut opts = options();
    opts.rescan_interval = Some(Duration::from_millis(50));
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], opts)?;
    let mut rec = EventRecorder::attach(&h.watch);

    // No raw event for this one: only the rescan can notice it.
    h.tree.write_module("entries/c.js", &[]);
    assert_eq!(describe(&h.tree, &rec.next().await), "add entries/c.js");

    h.tree.remove("entries/a.js");
    assert_eq!(describe(&h.tree, &rec.next().await), "remove entries/a.js");

    h.watch.close().await?;
    Ok(())
}

#[tokio::test]
async fn backend_overflow_triggers_rescan() -> TestResult {
    init_tracing();
    let h = LiveHarness::start(shared_tree(), &["entries/*.js"], options())?;
    let mut rec = EventRecorder::attach(&h.watch);

    h.tree.write_module("entries/d.js", &[]);
    h.send(RawEvent::Rescan);
    assert_eq!(describe(&h.tree, &rec.next().await), "add entries/d.js");

    h.watch.close().await?;
    Ok(())
}
