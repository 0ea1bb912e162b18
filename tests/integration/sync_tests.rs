use super::support::Gallery;
use gallery_sync::scheduler::{SyncError, SyncOutcome, SyncPhase};
use gallery_sync::store::{Orientation, RecordEdits, PRIMARY_MEDIA_TYPE, SNAPSHOT_MEDIA_TYPE};

fn synced(outcome: SyncOutcome) -> gallery_sync::scheduler::SyncReport {
    match outcome {
        SyncOutcome::Synced(report) => report,
        SyncOutcome::Clean => panic!("expected a pass to run"),
    }
}

#[test]
fn test_uploads_only_missing_assets_then_snapshot() {
    let gallery = Gallery::new();
    for name in ["a.jpg", "b.jpg"] {
        let source = gallery.incoming(name);
        gallery.library.create(&source, Orientation::Unset).unwrap();
    }
    gallery.archive.seed("a.jpg", PRIMARY_MEDIA_TYPE, b"old a".to_vec());
    gallery.archive.seed("gallery.db", SNAPSHOT_MEDIA_TYPE, b"old snapshot".to_vec());

    let report = synced(gallery.scheduler.tick().unwrap());

    assert_eq!(report.uploaded, vec!["b.jpg"]);
    assert_eq!(report.snapshots_trashed, 1);
    assert!(report.flag_cleared);
    assert_eq!(gallery.archive.uploads(), vec!["b.jpg", "gallery.db"]);
    assert_eq!(gallery.archive.trashed_names(), vec!["gallery.db"]);
    assert_eq!(gallery.archive.live_names(), vec!["a.jpg", "b.jpg", "gallery.db"]);
    assert_eq!(gallery.archive.parent_of("b.jpg").as_deref(), Some("gallery-backup"));

    let snapshot = gallery.archive.bytes_of("gallery.db").unwrap();
    assert!(snapshot.starts_with(b"SQLite format 3"));
    assert!(!gallery.library.cache().is_dirty());
}

#[test]
fn test_clean_cache_skips_remote_entirely() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    synced(gallery.scheduler.tick().unwrap());
    let uploads = gallery.archive.uploads();

    // Even a broken archive is fine: a clean pass never calls it.
    gallery.archive.fail_listing(true);
    assert_eq!(gallery.scheduler.tick().unwrap(), SyncOutcome::Clean);
    assert_eq!(gallery.archive.uploads(), uploads);
}

#[test]
fn test_second_sync_only_replaces_snapshot() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    synced(gallery.scheduler.tick().unwrap());

    let edits = RecordEdits {
        tags: Some("coast".into()),
        ..RecordEdits::default()
    };
    gallery.library.update("a.jpg", &edits).unwrap();
    assert!(gallery.library.cache().is_dirty());

    let report = synced(gallery.scheduler.tick().unwrap());
    assert!(report.uploaded.is_empty());
    assert_eq!(report.snapshots_trashed, 1);
    assert_eq!(gallery.archive.live_names(), vec!["a.jpg", "gallery.db"]);
    assert_eq!(gallery.archive.folder_count(), 1);
}

#[test]
fn test_failed_pass_keeps_flag_and_retries() {
    let gallery = Gallery::new();
    for name in ["a.jpg", "b.jpg"] {
        let source = gallery.incoming(name);
        gallery.library.create(&source, Orientation::Unset).unwrap();
    }
    gallery.archive.fail_upload_of("b.jpg");

    let err = gallery.scheduler.tick().unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
    assert!(gallery.library.cache().is_dirty());
    let status = gallery.scheduler.status();
    assert_eq!(status.failures, 1);
    assert_eq!(status.phase, SyncPhase::Idle);
    assert!(status.last_error.is_some());

    gallery.archive.heal_upload("b.jpg");
    let report = synced(gallery.scheduler.tick().unwrap());

    // a.jpg made it across on the failed pass and is not sent again.
    assert_eq!(report.uploaded, vec!["b.jpg"]);
    assert!(!gallery.library.cache().is_dirty());
    assert_eq!(gallery.scheduler.status().passes, 2);
}

#[test]
fn test_force_pass_syncs_clean_cache() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    synced(gallery.scheduler.tick().unwrap());

    let report = synced(gallery.scheduler.force_pass().unwrap());
    assert!(report.uploaded.is_empty());
    assert_eq!(report.snapshots_trashed, 1);
}

#[test]
fn test_mutation_from_separate_process_reaches_running_scheduler() {
    let daemon = Gallery::new();
    assert_eq!(daemon.scheduler.tick().unwrap(), SyncOutcome::Clean);

    let cli = daemon.second_writer();
    let source = daemon.incoming("new.jpg");
    cli.create(&source, Orientation::Unset).unwrap();
    assert!(!daemon.library.cache().is_dirty());

    let report = synced(daemon.scheduler.tick().unwrap());
    assert_eq!(report.uploaded, vec!["new.jpg"]);
    assert!(report.flag_cleared);
    assert!(daemon.library.snapshot().contains("new.jpg"));

    let edits = RecordEdits {
        tags: Some("coast".into()),
        ..RecordEdits::default()
    };
    cli.update("new.jpg", &edits).unwrap();
    let report = synced(daemon.scheduler.tick().unwrap());
    assert!(report.uploaded.is_empty());
    assert_eq!(report.snapshots_trashed, 1);
    assert_eq!(daemon.library.snapshot().tags(), ["coast", "all"]);
}

#[test]
fn test_unsynced_changes_survive_restart() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();

    // Stopped before any pass ran.
    let restarted = Gallery::open(gallery.dir);
    assert!(restarted.library.cache().is_dirty());
    let report = synced(restarted.scheduler.tick().unwrap());
    assert_eq!(report.uploaded, vec!["a.jpg"]);

    let restarted = Gallery::open(restarted.dir);
    assert!(!restarted.library.cache().is_dirty());
    assert_eq!(restarted.scheduler.tick().unwrap(), SyncOutcome::Clean);
}

#[test]
fn test_deleted_asset_is_not_uploaded() {
    let gallery = Gallery::new();
    for name in ["a.jpg", "b.jpg"] {
        let source = gallery.incoming(name);
        gallery.library.create(&source, Orientation::Unset).unwrap();
    }
    gallery.library.delete("a.jpg").unwrap();

    let report = synced(gallery.scheduler.tick().unwrap());
    assert_eq!(report.uploaded, vec!["b.jpg"]);
}
