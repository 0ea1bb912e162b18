use super::support::Gallery;
use gallery_sync::library::LibraryError;
use gallery_sync::store::{Dimensions, Orientation, RecordEdits};
use std::fs;

#[test]
fn test_create_generates_variants_and_indexes() {
    let gallery = Gallery::new();
    let source = gallery.incoming("harbour_at_dusk.jpg");

    let record = gallery.library.create(&source, Orientation::Landscape).unwrap();

    assert_eq!(record.name, "harbour_at_dusk.jpg");
    assert_eq!(record.alt, "harbour at dusk");
    assert_eq!(record.small, Dimensions::new(40, 30));
    assert_eq!(record.medium, Dimensions::new(120, 90));
    assert!(gallery.path("images/harbour_at_dusk.jpg").exists());
    assert!(gallery.path("small/harbour_at_dusk.jpg").exists());
    assert!(gallery.path("medium/harbour_at_dusk.jpg").exists());

    let snapshot = gallery.library.snapshot();
    assert!(snapshot.contains("harbour_at_dusk.jpg"));
    assert_eq!(snapshot.tags(), ["all"]);
    assert!(gallery.library.cache().is_dirty());
}

#[test]
fn test_create_portrait_transposes_geometry() {
    let gallery = Gallery::new();
    let source = gallery.incoming("tower.jpg");

    let record = gallery.library.create(&source, Orientation::Portrait).unwrap();

    assert_eq!(record.small, Dimensions::new(30, 40));
    assert_eq!(record.medium, Dimensions::new(90, 120));
    let calls = gallery.convert.calls.lock().unwrap();
    assert_eq!(calls[0], vec!["-resize", "30x40", "-strip"]);
    assert_eq!(calls[1], vec!["-resize", "90x120>", "-quality", "90"]);
}

#[test]
fn test_create_rejects_duplicates_and_bad_names() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();

    let again = gallery.library.create(&source, Orientation::Unset);
    assert!(matches!(again, Err(LibraryError::AlreadyExists(name)) if name == "a.jpg"));

    let png = gallery.incoming("a.png");
    assert!(matches!(
        gallery.library.create(&png, Orientation::Unset),
        Err(LibraryError::InvalidName { .. })
    ));
    assert_eq!(gallery.library.snapshot().len(), 1);
}

#[test]
fn test_update_tags_rebuilds_index_without_regenerating() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    let calls_before = gallery.convert.calls.lock().unwrap().len();

    let edits = RecordEdits {
        tags: Some("x, y".into()),
        description: Some("first light".into()),
        ..RecordEdits::default()
    };
    let record = gallery.library.update("a.jpg", &edits).unwrap();

    assert_eq!(record.description, "first light");
    assert_eq!(gallery.convert.calls.lock().unwrap().len(), calls_before);

    let snapshot = gallery.library.snapshot();
    assert_eq!(snapshot.tags(), ["x", "y", "all"]);
    assert_eq!(snapshot.tagged("y").len(), 1);
    assert_eq!(snapshot.get("a.jpg").unwrap().tags, "x, y");
}

#[test]
fn test_update_orientation_regenerates() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Landscape).unwrap();

    let edits = RecordEdits {
        orientation: Some(Orientation::Portrait),
        ..RecordEdits::default()
    };
    let record = gallery.library.update("a.jpg", &edits).unwrap();

    assert_eq!(record.small, Dimensions::new(30, 40));
    let cached = gallery.library.snapshot();
    assert_eq!(cached.get("a.jpg").unwrap().medium, Dimensions::new(90, 120));
    assert_eq!(gallery.convert.calls.lock().unwrap().len(), 4);
}

#[test]
fn test_create_over_orphaned_record_keeps_its_variants() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    fs::remove_file(gallery.path("images/a.jpg")).unwrap();

    let again = gallery.library.create(&source, Orientation::Unset);

    assert!(matches!(again, Err(LibraryError::AlreadyExists(_))));
    assert!(gallery.path("small/a.jpg").exists());
    assert!(gallery.path("medium/a.jpg").exists());
    assert!(!gallery.path("images/a.jpg").exists());
    assert!(gallery.library.snapshot().contains("a.jpg"));
}

#[test]
fn test_update_missing_is_not_found() {
    let gallery = Gallery::new();
    let result = gallery.library.update("ghost.jpg", &RecordEdits::default());
    assert!(matches!(result, Err(LibraryError::NotFound(_))));
}

#[test]
fn test_delete_removes_files_and_record() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();

    gallery.library.delete("a.jpg").unwrap();

    assert!(!gallery.path("images/a.jpg").exists());
    assert!(!gallery.path("small/a.jpg").exists());
    assert!(!gallery.path("medium/a.jpg").exists());
    assert!(gallery.library.snapshot().is_empty());
    assert!(matches!(
        gallery.library.delete("a.jpg"),
        Err(LibraryError::NotFound(_))
    ));
}

#[test]
fn test_records_survive_reopen() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Portrait).unwrap();
    let edits = RecordEdits {
        tags: Some("coast".into()),
        hidden: Some(true),
        ..RecordEdits::default()
    };
    gallery.library.update("a.jpg", &edits).unwrap();

    let reopened = Gallery::open(gallery.dir);
    let snapshot = reopened.library.snapshot();
    let record = snapshot.get("a.jpg").unwrap();
    assert_eq!(record.orientation, Orientation::Portrait);
    assert!(record.hidden);
    assert_eq!(snapshot.tags(), ["coast", "all"]);
    // Nothing was archived before the reopen.
    assert!(reopened.library.cache().is_dirty());
}

#[test]
fn test_init_derived_dirs_regenerates_when_empty() {
    let gallery = Gallery::new();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let source = gallery.incoming(name);
        gallery.library.create(&source, Orientation::Unset).unwrap();
    }
    fs::remove_dir_all(gallery.path("small")).unwrap();

    let regenerated = gallery.library.init_derived_dirs().unwrap();

    assert_eq!(regenerated, 3);
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(gallery.path("small").join(name).exists());
    }
}

#[test]
fn test_init_derived_dirs_noop_when_populated() {
    let gallery = Gallery::new();
    let source = gallery.incoming("a.jpg");
    gallery.library.create(&source, Orientation::Unset).unwrap();
    let calls_before = gallery.convert.calls.lock().unwrap().len();

    assert_eq!(gallery.library.init_derived_dirs().unwrap(), 0);
    assert_eq!(gallery.convert.calls.lock().unwrap().len(), calls_before);
}
