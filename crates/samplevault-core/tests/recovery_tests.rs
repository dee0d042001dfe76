use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use samplevault_core::{AppConfig, FolderStatus, ResumeStats, ScanEngine, SilentReporter};

fn engine(tmp: &TempDir) -> ScanEngine {
    let config = AppConfig {
        database_path: tmp.path().join("catalog.db"),
        ..AppConfig::default()
    };
    ScanEngine::open(config).unwrap()
}

fn library(tmp: &TempDir, name: &str) -> PathBuf {
    let root = tmp.path().join(name);
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
fn test_nothing_to_resume() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp, "lib");
    write(&root.join("kick.wav"), b"kick");

    let engine = engine(&tmp);
    engine.scan(&[root], &SilentReporter).unwrap();

    let stats = engine.resume_incomplete_scans(&SilentReporter).unwrap();
    assert_eq!(stats, ResumeStats::default());
}

#[test]
fn test_interrupted_scan_is_completed() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp, "lib");
    write(&root.join("kick.wav"), b"kick");
    write(&root.join("snare.wav"), b"snare");

    let engine = engine(&tmp);
    // a scan that died while walking
    let db = engine.catalog().connect().unwrap();
    db.register_folder(&key(&root)).unwrap();
    db.set_folder_status(&key(&root), FolderStatus::Scanning).unwrap();

    let stats = engine.resume_incomplete_scans(&SilentReporter).unwrap();
    assert_eq!(stats.resumed, 1);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.errors, 0);

    let folder = db.get_folder(&key(&root)).unwrap().unwrap();
    assert_eq!(folder.status, FolderStatus::Active);
    assert_eq!(folder.file_count, 2);
}

#[test]
fn test_partially_ingested_root_only_adds_the_rest() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp, "lib");
    write(&root.join("kick.wav"), b"kick");

    let engine = engine(&tmp);
    engine.scan(&[root.clone()], &SilentReporter).unwrap();

    // crash after the first batch was flushed
    write(&root.join("snare.wav"), b"snare");
    let db = engine.catalog().connect().unwrap();
    db.set_folder_status(&key(&root), FolderStatus::Processing).unwrap();

    let stats = engine.resume_incomplete_scans(&SilentReporter).unwrap();
    assert_eq!(stats.resumed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(db.count_active_files().unwrap(), 2);
    assert_eq!(db.known_location_paths().unwrap().len(), 2);
}

#[test]
fn test_each_incomplete_root_is_resumed() {
    let tmp = tempdir().unwrap();
    let drums = library(&tmp, "drums");
    let loops = library(&tmp, "loops");
    let done = library(&tmp, "done");
    write(&drums.join("kick.wav"), b"kick");
    write(&loops.join("break.wav"), b"break");
    write(&done.join("pad.wav"), b"pad");

    let engine = engine(&tmp);
    engine.scan(&[done.clone()], &SilentReporter).unwrap();

    let db = engine.catalog().connect().unwrap();
    for (root, status) in [(&drums, FolderStatus::Pending), (&loops, FolderStatus::Error)] {
        db.register_folder(&key(root)).unwrap();
        db.set_folder_status(&key(root), status).unwrap();
    }

    let stats = engine.resume_incomplete_scans(&SilentReporter).unwrap();
    assert_eq!(stats.resumed, 2);
    assert_eq!(stats.completed, 2);

    for root in [&drums, &loops, &done] {
        assert_eq!(
            db.get_folder(&key(root)).unwrap().unwrap().status,
            FolderStatus::Active
        );
    }
    assert!(db.incomplete_folders().unwrap().is_empty());
}

#[test]
fn test_vanished_root_stays_in_error() {
    let tmp = tempdir().unwrap();
    let root = library(&tmp, "lib");
    write(&root.join("kick.wav"), b"kick");

    let engine = engine(&tmp);
    let db = engine.catalog().connect().unwrap();
    db.register_folder(&key(&root)).unwrap();
    db.set_folder_status(&key(&root), FolderStatus::Processing).unwrap();
    fs::remove_dir_all(&root).unwrap();

    let stats = engine.resume_incomplete_scans(&SilentReporter).unwrap();
    assert_eq!(stats.resumed, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(
        db.get_folder(&key(&root)).unwrap().unwrap().status,
        FolderStatus::Error
    );
}
