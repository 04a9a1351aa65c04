use std::path::{Path, PathBuf};

use depwatch::fs::mock::MockFileSystem;
use depwatch::types::CaseSensitivity;
use depwatch::watch::{classify, raw_events_from_notify, FsChange, RawEvent};
use notify::event::{
    AccessKind, CreateKind, DataChange, Flag, MetadataKind, ModifyKind, RemoveKind, RenameMode,
};
use notify::{Event, EventKind};

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn tracked(paths: &'static [&'static str]) -> impl Fn(&Path) -> bool {
    move |path: &Path| paths.iter().any(|t| Path::new(t) == path)
}

fn fixture() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/a.js", "");
    fs.add_file("/proj/new.js", "");
    fs
}

#[test]
fn writes_and_creations() {
    let fs = fixture();
    let case = CaseSensitivity::Sensitive;
    let is_tracked = tracked(&["/proj/a.js", "/proj/gone.js"]);

    assert_eq!(
        classify(&RawEvent::Modified(p("/proj/a.js")), case, &fs, &is_tracked),
        vec![FsChange::Changed(p("/proj/a.js"))]
    );
    assert_eq!(
        classify(&RawEvent::Created(p("/proj/new.js")), case, &fs, &is_tracked),
        vec![FsChange::Appeared(p("/proj/new.js"))]
    );
    // A tracked path reported as modified but no longer there.
    assert_eq!(
        classify(&RawEvent::Moved(p("/proj/gone.js")), case, &fs, &is_tracked),
        vec![FsChange::Disappeared(p("/proj/gone.js"))]
    );
    assert!(classify(&RawEvent::Modified(p("/proj/none.js")), case, &fs, &is_tracked).is_empty());
}

#[test]
fn removals() {
    let fs = fixture();
    let case = CaseSensitivity::Sensitive;
    let is_tracked = tracked(&["/proj/a.js", "/proj/gone.js"]);

    assert_eq!(
        classify(&RawEvent::Removed(p("/proj/gone.js")), case, &fs, &is_tracked),
        vec![FsChange::Disappeared(p("/proj/gone.js"))]
    );
    // Replaced in place: the removal is followed by a new file at the path.
    assert_eq!(
        classify(&RawEvent::Removed(p("/proj/a.js")), case, &fs, &is_tracked),
        vec![FsChange::Changed(p("/proj/a.js"))]
    );
    assert!(classify(&RawEvent::Removed(p("/proj/other.js")), case, &fs, &is_tracked).is_empty());
}

#[test]
fn renames_by_case_sensitivity() {
    let fs = MockFileSystem::case_insensitive();
    fs.add_file("/proj/app.js", "");
    let is_tracked = tracked(&["/proj/App.js"]);

    let case_only = RawEvent::Renamed {
        from: p("/proj/App.js"),
        to: p("/proj/app.js"),
    };
    assert_eq!(
        classify(&case_only, CaseSensitivity::Insensitive, &fs, &is_tracked),
        vec![FsChange::RenamedCaseOnly {
            from: p("/proj/App.js"),
            to: p("/proj/app.js"),
        }]
    );
    assert_eq!(
        classify(&case_only, CaseSensitivity::Sensitive, &fs, &is_tracked),
        vec![FsChange::RenamedStructural {
            from: p("/proj/App.js"),
            to: p("/proj/app.js"),
        }]
    );

    let untracked = RawEvent::Renamed {
        from: p("/proj/tmp/x"),
        to: p("/proj/tmp/y"),
    };
    assert!(classify(&untracked, CaseSensitivity::Insensitive, &fs, &is_tracked).is_empty());
}

#[test]
fn rename_into_place_of_untracked_file() {
    let fs = fixture();
    let rename = RawEvent::Renamed {
        from: p("/proj/.new.js.swp"),
        to: p("/proj/new.js"),
    };
    assert_eq!(
        classify(&rename, CaseSensitivity::Sensitive, &fs, tracked(&[])),
        vec![FsChange::RenamedStructural {
            from: p("/proj/.new.js.swp"),
            to: p("/proj/new.js"),
        }]
    );
    assert!(classify(&RawEvent::Rescan, CaseSensitivity::Sensitive, &fs, tracked(&[])).is_empty());
}

#[test]
fn appearances_are_marked_for_settling() {
    assert!(FsChange::Appeared(p("/a")).is_appearance());
    assert!(FsChange::RenamedStructural { from: p("/a"), to: p("/b") }.is_appearance());
    assert!(!FsChange::Changed(p("/a")).is_appearance());
    assert!(!FsChange::Disappeared(p("/a")).is_appearance());
}

#[test]
fn notify_events_map_onto_raw_events() {
    let create = Event::new(EventKind::Create(CreateKind::File)).add_path(p("/proj/a.js"));
    assert_eq!(raw_events_from_notify(create), vec![RawEvent::Created(p("/proj/a.js"))]);

    let remove = Event::new(EventKind::Remove(RemoveKind::Any)).add_path(p("/proj/a.js"));
    assert_eq!(raw_events_from_notify(remove), vec![RawEvent::Removed(p("/proj/a.js"))]);

    let write = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
        .add_path(p("/proj/a.js"));
    assert_eq!(raw_events_from_notify(write), vec![RawEvent::Modified(p("/proj/a.js"))]);

    let polled = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)))
        .add_path(p("/proj/a.js"));
    assert_eq!(raw_events_from_notify(polled), vec![RawEvent::Modified(p("/proj/a.js"))]);

    let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(p("/proj/a.js"))
        .add_path(p("/proj/b.js"));
    assert_eq!(
        raw_events_from_notify(both),
        vec![RawEvent::Renamed {
            from: p("/proj/a.js"),
            to: p("/proj/b.js"),
        }]
    );

    let half = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
        .add_path(p("/proj/a.js"));
    assert_eq!(raw_events_from_notify(half), vec![RawEvent::Moved(p("/proj/a.js"))]);
}

#[test]
fn noise_is_dropped_and_overflow_requests_a_rescan() {
    let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(p("/proj/a.js"));
    assert!(raw_events_from_notify(access).is_empty());

    let perms = Event::new(EventKind::Modify(ModifyKind::Metadata(
        MetadataKind::Permissions,
    )))
    .add_path(p("/proj/a.js"));
    assert!(raw_events_from_notify(perms).is_empty());

    let overflow = Event::new(EventKind::Other).set_flag(Flag::Rescan);
    assert_eq!(raw_events_from_notify(overflow), vec![RawEvent::Rescan]);
}
