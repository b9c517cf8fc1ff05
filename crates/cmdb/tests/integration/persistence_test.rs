//! Integration tests for snapshot save/load through file and memory backends.

use cmdb::storage::codec::{decode_snapshot, Encoder};
use cmdb::{Ci, Cmdb, CmdbError, FileBackend, MemoryBackend, StorageBackend, StoreConfig};
use tempfile::TempDir;

fn populate(cmdb: &Cmdb) {
    cmdb.add_level("Network").unwrap();
    cmdb.add_ci(
        Ci::new("srv-1", "Host 1", "Server")
            .with_level(3)
            .with_property("os", "linux")
            .with_property("ram", "32GB"),
    )
    .unwrap();
    cmdb.add_ci(Ci::new("app-1", "Billing", "Application").with_level(1))
        .unwrap();
    cmdb.add_ci(Ci::new("sw-1", "Switch", "Switch").with_level(4))
        .unwrap();
    cmdb.add_relationship("app-1", "srv-1", "runs_on").unwrap();
    cmdb.add_weighted_relationship("app-1", "srv-1", "runs_on", 0.5)
        .unwrap();
    cmdb.add_relationship("srv-1", "sw-1", "connected_to").unwrap();
}

fn sorted_relationships(cmdb: &Cmdb) -> Vec<(String, String, String, u64)> {
    let mut rels: Vec<_> = cmdb
        .get_relationships()
        .iter()
        .map(|rel| {
            (
                rel.source().to_string(),
                rel.destination().to_string(),
                rel.rel_type().to_string(),
                rel.weight().to_bits(),
            )
        })
        .collect();
    rels.sort();
    rels
}

#[test]
fn test_save_clear_load_round_trip() {
    let cmdb = Cmdb::in_memory().unwrap();
    populate(&cmdb);
    let levels = cmdb.levels();
    let cis = cmdb.get_cis();
    let rels = sorted_relationships(&cmdb);

    cmdb.save().unwrap();
    assert!(!cmdb.is_modified());

    cmdb.clear();
    assert!(cmdb.is_modified());
    assert_eq!(cmdb.ci_count(), 0);

    cmdb.load().unwrap();
    assert!(!cmdb.is_modified());
    assert_eq!(cmdb.levels(), levels);
    assert_eq!(cmdb.get_cis(), cis);
    assert_eq!(sorted_relationships(&cmdb), rels);

    // Indices are rebuilt from the loaded collections.
    assert_eq!(cmdb.get_dependent_cis("srv-1").len(), 2);
    assert_eq!(cmdb.get_cis_with_properties(&["os", "ram"]).len(), 1);
}

#[test]
fn test_file_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cmdb.bin");

    {
        let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
        populate(&cmdb);
        cmdb.close().unwrap();
    }
    assert!(path.exists());
    assert!(!temp_dir.path().join("cmdb.bin.tmp").exists());

    let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
    assert!(!cmdb.is_modified());
    assert_eq!(cmdb.level_count(), 5);
    assert_eq!(cmdb.ci_count(), 3);
    assert_eq!(cmdb.relationship_count(), 3);
    assert_eq!(cmdb.get_ci("srv-1").unwrap().property("ram"), Some("32GB"));
}

#[test]
fn test_drop_saves_pending_changes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cmdb.bin");

    {
        let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
        cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();
    }

    let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
    assert!(cmdb.contains_ci("a"));
}

#[test]
fn test_missing_file_starts_with_default_levels() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fresh.bin");

    let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
    assert_eq!(cmdb.level_count(), 4);
    assert!(cmdb.is_modified());
    assert!(!path.exists());
}

#[test]
fn test_corrupt_file_fails_to_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cmdb.bin");
    std::fs::write(&path, b"CMDB\x01\x00garbage").unwrap();

    let err = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap_err();
    assert!(matches!(err, CmdbError::Serialization { .. }));
}

#[test]
fn test_failed_load_keeps_current_state() {
    let backend = MemoryBackend::new();
    let cmdb = Cmdb::with_backend(Box::new(backend.clone()), StoreConfig::without_autosave()).unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();

    // Nothing saved yet.
    assert!(matches!(cmdb.load(), Err(CmdbError::Storage { .. })));

    let mut writer = backend.clone();
    writer.write_snapshot(b"\xff\xff").unwrap();
    assert!(cmdb.load().is_err());
    assert!(cmdb.contains_ci("a"));
}

#[test]
fn test_legacy_snapshot_without_header_loads() {
    // Hand-built legacy body: one level, one CI with one property, no relationships.
    let mut enc = Encoder::new();
    enc.put_len(1);
    enc.put_str("Physical Layer");
    enc.put_len(1);
    enc.put_str("srv-1");
    enc.put_str("Host 1");
    enc.put_str("Server");
    enc.put_i32(0);
    enc.put_len(1);
    enc.put_str("os");
    enc.put_str("linux");
    enc.put_len(0);

    let backend = MemoryBackend::with_snapshot(enc.into_bytes());
    let cmdb = Cmdb::with_backend(Box::new(backend.clone()), StoreConfig::without_autosave()).unwrap();

    assert_eq!(cmdb.levels(), vec!["Physical Layer"]);
    assert_eq!(cmdb.get_ci("srv-1").unwrap().property("os"), Some("linux"));

    // Saving upgrades the file to the headered format.
    cmdb.save().unwrap();
    let saved = backend.snapshot().unwrap();
    assert_eq!(&saved[..4], b"CMDB");
    assert_eq!(decode_snapshot(&saved).unwrap().cis.len(), 1);
}

#[test]
fn test_saved_bytes_decode_to_store_contents() {
    let backend = MemoryBackend::new();
    let cmdb = Cmdb::with_backend(Box::new(backend.clone()), StoreConfig::without_autosave()).unwrap();
    populate(&cmdb);
    cmdb.save().unwrap();

    let snapshot = decode_snapshot(&backend.snapshot().unwrap()).unwrap();
    assert_eq!(snapshot.levels, cmdb.levels());
    assert_eq!(snapshot.cis, cmdb.get_cis());
    assert_eq!(snapshot.relationships.len(), 3);
}

#[test]
fn test_file_backend_rename_guard_cleans_up() {
    let temp_dir = TempDir::new().unwrap();
    let mut backend = FileBackend::new(temp_dir.path().join("cmdb.bin"));

    backend.write_snapshot(b"one").unwrap();
    backend.write_snapshot(b"two").unwrap();

    assert_eq!(backend.read_snapshot().unwrap(), Some(b"two".to_vec()));
    assert!(!backend.temp_path().exists());
    assert_eq!(backend.describe(), backend.path().display().to_string());
}

#[test]
fn test_orphaned_guard_file_blocks_open_and_survives() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cmdb.bin");
    let guard = temp_dir.path().join("cmdb.bin.tmp");

    {
        let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
        cmdb.add_ci(Ci::new("precious", "Only copy", "Server")).unwrap();
        cmdb.close().unwrap();
    }
    // A save interrupted after moving the primary file aside.
    std::fs::rename(&path, &guard).unwrap();
    let saved = std::fs::read(&guard).unwrap();

    let err = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap_err();
    assert!(matches!(err, CmdbError::Storage { .. }));
    assert!(err.to_string().contains("cmdb.bin.tmp"));

    assert_eq!(std::fs::read(&guard).unwrap(), saved);
    assert!(!path.exists());

    // Restoring the guard copy brings the data back.
    std::fs::rename(&guard, &path).unwrap();
    let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
    assert!(cmdb.contains_ci("precious"));
}

#[test]
fn test_save_refuses_to_clobber_guard_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cmdb.bin");
    let guard = temp_dir.path().join("cmdb.bin.tmp");

    let cmdb = Cmdb::open_with_config(&path, StoreConfig::without_autosave()).unwrap();
    cmdb.save().unwrap();
    std::fs::write(&guard, b"operator copy").unwrap();

    cmdb.add_ci(Ci::new("new", "New", "Server")).unwrap();
    assert!(matches!(cmdb.save(), Err(CmdbError::Storage { .. })));
    assert!(cmdb.is_modified());
    assert_eq!(std::fs::read(&guard).unwrap(), b"operator copy".to_vec());

    std::fs::remove_file(&guard).unwrap();
    cmdb.close().unwrap();
}
