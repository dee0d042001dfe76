use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

use samplevault_core::{AppConfig, Phase, ScanEngine, SilentReporter};

fn engine_with(tmp: &TempDir, reconcile_progress_interval: usize) -> ScanEngine {
    let config = AppConfig {
        database_path: tmp.path().join("catalog.db"),
        reconcile_progress_interval,
        ..AppConfig::default()
    };
    ScanEngine::open(config).unwrap()
}

fn library(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().join("lib");
    fs::create_dir_all(&root).unwrap();
    root.canonicalize().unwrap()
}

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_all_present_locations_verify() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    write(&root.join("kick.wav"), b"kick");
    write(&root.join("snare.wav"), b"snare");

    let engine = engine_with(&tmp, 50);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();

    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.total_locations, 2);
    assert_eq!(report.valid_locations, 2);
    assert_eq!(report.missing_locations, 0);
    assert_eq!(report.orphaned_files, 0);
    assert!(report.missing_details.is_empty());
}

#[test]
fn test_missing_primary_is_repaired() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    let a = root.join("a/kick.wav");
    let b = root.join("b/kick.wav");
    write(&a, b"kick");
    write(&b, b"kick");

    let engine = engine_with(&tmp, 50);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();
    fs::remove_file(&a).unwrap();

    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report.total_locations, 2);
    assert_eq!(report.valid_locations, 1);
    assert_eq!(report.missing_locations, 1);
    assert_eq!(report.orphaned_files, 0);
    assert_eq!(report.missing_details.len(), 1);
    let missing = &report.missing_details[0];
    assert_eq!(missing.path, key(&a));
    assert!(missing.was_primary);

    let db = engine.catalog().connect().unwrap();
    let a_loc = db.get_location_by_path(&key(&a)).unwrap().unwrap();
    let b_loc = db.get_location_by_path(&key(&b)).unwrap().unwrap();
    assert!(!a_loc.is_primary);
    assert!(a_loc.last_verified.is_none());
    assert!(b_loc.is_primary);
    assert!(b_loc.last_verified.is_some());
    let file = db.get_file(a_loc.file_id).unwrap().unwrap();
    assert_eq!(missing.content_hash, file.content_hash);
}

#[test]
fn test_copy_then_delete_scenario() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    let kick = root.join("kick.wav");
    let kick2 = root.join("copies/kick2.wav");
    write(&kick, b"kick drum one shot");
    write(&root.join("snare.wav"), b"snare drum one shot");

    let engine = engine_with(&tmp, 50);
    let stats = engine.scan(&[root.clone()], &SilentReporter).unwrap();
    assert_eq!((stats.total, stats.added, stats.skipped, stats.errors), (2, 2, 0, 0));

    fs::create_dir_all(kick2.parent().unwrap()).unwrap();
    fs::copy(&kick, &kick2).unwrap();
    let stats = engine.scan(&[root.clone()], &SilentReporter).unwrap();
    assert_eq!(stats.added, 1);
    assert_eq!(stats.skipped, 2);

    let db = engine.catalog().connect().unwrap();
    let kick_loc = db.get_location_by_path(&key(&kick)).unwrap().unwrap();
    assert_eq!(db.locations_for_file(kick_loc.file_id).unwrap().len(), 2);
    assert!(kick_loc.is_primary);

    fs::remove_file(&kick).unwrap();
    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report.missing_locations, 1);
    assert_eq!(report.orphaned_files, 0);

    let kick2_loc = db.get_location_by_path(&key(&kick2)).unwrap().unwrap();
    assert!(kick2_loc.is_primary);
    assert!(!db.get_location(kick_loc.id).unwrap().unwrap().is_primary);
}

#[test]
fn test_file_with_no_locations_left_is_orphaned_not_deleted() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    let a = root.join("a/kick.wav");
    let b = root.join("b/kick.wav");
    write(&a, b"kick");
    write(&b, b"kick");

    let engine = engine_with(&tmp, 50);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();
    fs::remove_file(&a).unwrap();
    fs::remove_file(&b).unwrap();

    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report.missing_locations, 2);
    assert_eq!(report.orphaned_files, 1);
    assert_eq!(report.total_files, 1);

    let db = engine.catalog().connect().unwrap();
    let a_loc = db.get_location_by_path(&key(&a)).unwrap().unwrap();
    let file = db.get_file(a_loc.file_id).unwrap().unwrap();
    assert!(file.indexed);
    let locations = db.locations_for_file(file.id).unwrap();
    assert_eq!(locations.len(), 2);
    assert!(locations.iter().all(|l| l.last_verified.is_none()));
    assert_eq!(locations.iter().filter(|l| l.is_primary).count(), 1);
}

#[test]
fn test_restored_file_verifies_again() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    let kick = root.join("kick.wav");
    write(&kick, b"kick");

    let engine = engine_with(&tmp, 50);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();

    fs::remove_file(&kick).unwrap();
    assert_eq!(engine.reconcile(&SilentReporter).unwrap().orphaned_files, 1);

    write(&kick, b"kick");
    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report.valid_locations, 1);
    assert_eq!(report.orphaned_files, 0);

    let db = engine.catalog().connect().unwrap();
    let location = db.get_location_by_path(&key(&kick)).unwrap().unwrap();
    assert!(location.is_primary);
    assert!(location.last_verified.is_some());
}

#[test]
fn test_rescan_after_loss_takes_over_primary() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    let a = root.join("a/kick.wav");
    write(&a, b"kick");

    let engine = engine_with(&tmp, 50);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();
    fs::remove_file(&a).unwrap();
    engine.reconcile(&SilentReporter).unwrap();

    let c = root.join("c/kick.wav");
    write(&c, b"kick");
    let stats = engine.scan(&[root.clone()], &SilentReporter).unwrap();
    assert_eq!(stats.added, 1);

    let db = engine.catalog().connect().unwrap();
    let a_loc = db.get_location_by_path(&key(&a)).unwrap().unwrap();
    let c_loc = db.get_location_by_path(&key(&c)).unwrap().unwrap();
    assert_eq!(a_loc.file_id, c_loc.file_id);
    assert!(!a_loc.is_primary);
    assert!(c_loc.is_primary);
}

#[test]
fn test_reconcile_progress_cadence() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp);
    for name in ["a.wav", "b.wav", "c.wav", "d.wav", "e.wav"] {
        write(&root.join(name), name.as_bytes());
    }

    let engine = engine_with(&tmp, 2);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();

    let events = Mutex::new(Vec::new());
    let reporter = |phase: Phase, pct: u8, msg: &str| {
        events.lock().unwrap().push((phase, pct, msg.to_string()));
    };
    let report = engine.reconcile(&reporter).unwrap();
    assert_eq!(report.valid_locations, 5);

    assert_eq!(
        events.into_inner().unwrap(),
        vec![
            (Phase::Reconciling, 40, "Checked 2/5 locations".to_string()),
            (Phase::Reconciling, 80, "Checked 4/5 locations".to_string()),
        ]
    );
}

#[test]
fn test_reconcile_empty_catalog() {
    let tmp = tempdir().unwrap();
    let engine = engine_with(&tmp, 50);
    let report = engine.reconcile(&SilentReporter).unwrap();
    assert_eq!(report, Default::default());
}
