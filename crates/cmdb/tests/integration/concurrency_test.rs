//! Concurrent access to one shared store.

use cmdb::{Ci, Cmdb, MemoryBackend, StoreConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_parallel_writers_and_readers() {
    let cmdb = Arc::new(Cmdb::in_memory().unwrap());
    cmdb.add_ci(Ci::new("hub", "Hub", "Switch")).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cmdb = Arc::clone(&cmdb);
            thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("ci-{t}-{i}");
                    cmdb.add_ci(Ci::new(id.as_str(), "N", "Server").with_property("thread", t.to_string()))
                        .unwrap();
                    cmdb.add_relationship(&id, "hub", "connected_to").unwrap();
                    if i % 5 == 0 {
                        cmdb.remove_ci(&id).unwrap();
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let cmdb = Arc::clone(&cmdb);
            thread::spawn(move || {
                for _ in 0..100 {
                    let dependents = cmdb.get_dependent_cis("hub");
                    for rel in dependents {
                        assert_eq!(rel.destination(), "hub");
                    }
                    let _ = cmdb.get_cis_with_properties(&["thread"]);
                    let _ = cmdb.get_cis_at_distance("ci-0-1", 1);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    // 50 per thread, every fifth removed.
    assert_eq!(cmdb.ci_count(), 1 + 4 * 40);
    assert_eq!(cmdb.relationship_count(), 4 * 40);
    assert_eq!(cmdb.get_dependent_cis("hub").len(), 4 * 40);
    assert_eq!(cmdb.get_cis_with_properties(&["thread"]).len(), 4 * 40);
}

#[test]
fn test_mutations_during_autosave_are_not_lost() {
    let backend = MemoryBackend::new();
    let config = StoreConfig::default().autosave_interval(Duration::from_millis(1));
    let cmdb = Arc::new(Cmdb::with_backend(Box::new(backend.clone()), config).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cmdb = Arc::clone(&cmdb);
            thread::spawn(move || {
                for i in 0..100 {
                    cmdb.add_ci(Ci::new(format!("ci-{t}-{i}"), "N", "T")).unwrap();
                }
            })
        })
        .collect();
    for handle in writers {
        handle.join().unwrap();
    }

    let cmdb = Arc::try_unwrap(cmdb).unwrap();
    cmdb.close().unwrap();

    let reopened = Cmdb::with_backend(Box::new(backend), StoreConfig::without_autosave()).unwrap();
    assert_eq!(reopened.ci_count(), 400);
}
