//! Integration tests for store operations and index consistency.

use cmdb::{Ci, CiUpdate, Cmdb, CmdbError, PropertyMap, RelationshipFilter, StoreConfig};

fn empty_store() -> Cmdb {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.set_levels::<&str>(&[]).unwrap();
    cmdb
}

fn ids(cis: &[Ci]) -> Vec<&str> {
    cis.iter().map(Ci::id).collect()
}

#[test]
fn test_new_store_has_default_levels() {
    let cmdb = Cmdb::in_memory().unwrap();
    assert_eq!(
        cmdb.levels(),
        vec![
            "Business Layer",
            "Application Layer",
            "Logical Layer",
            "Physical Layer"
        ]
    );
    assert!(cmdb.is_modified());
}

#[test]
fn test_configured_default_levels() {
    let config = StoreConfig::without_autosave().default_levels(["Service", "Host", "Service"]);
    let cmdb = Cmdb::with_backend(Box::new(cmdb::MemoryBackend::new()), config).unwrap();
    assert_eq!(cmdb.levels(), vec!["Service", "Host"]);
}

#[test]
fn test_level_and_ci_scenario() {
    let cmdb = empty_store();

    assert_eq!(cmdb.add_level("L0").unwrap(), 0);
    cmdb.add_ci(Ci::new("C1", "N1", "T1")).unwrap();

    let err = cmdb.add_ci(Ci::new("C2", "N2", "T1").with_level(1)).unwrap_err();
    assert!(matches!(err, CmdbError::LevelNotFound { index: 1, count: 1 }));

    assert_eq!(cmdb.add_level("L1").unwrap(), 1);
    cmdb.add_ci(Ci::new("C2", "N2", "T1").with_level(1)).unwrap();

    cmdb.add_relationship("C1", "C2", "uses").unwrap();
    let rels = cmdb.get_relationships_between("C1", "C2");
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].rel_type(), "uses");

    cmdb.remove_ci("C1").unwrap();
    assert!(cmdb.get_relationships_between("C1", "C2").is_empty());
    assert!(cmdb.get_dependent_cis("C2").is_empty());
}

#[test]
fn test_add_level_is_idempotent() {
    let cmdb = empty_store();
    let first = cmdb.add_level("Network").unwrap();
    let second = cmdb.add_level("Network").unwrap();
    assert_eq!(first, second);
    assert_eq!(cmdb.level_count(), 1);
}

#[test]
fn test_add_levels_bulk() {
    let cmdb = empty_store();
    cmdb.add_level("B").unwrap();
    assert_eq!(cmdb.add_levels(&["A", "B", "C"]).unwrap(), vec![1, 0, 2]);
    assert_eq!(cmdb.levels(), vec!["B", "A", "C"]);
}

#[test]
fn test_level_lookup_sentinels() {
    let cmdb = empty_store();
    cmdb.add_level("L0").unwrap();
    assert_eq!(cmdb.level_name(0).as_deref(), Some("L0"));
    assert_eq!(cmdb.level_name(1), None);
    assert_eq!(cmdb.level_index("L0"), Some(0));
    assert_eq!(cmdb.level_index("missing"), None);
}

#[test]
fn test_rename_level() {
    let cmdb = empty_store();
    cmdb.add_levels(&["L0", "L1"]).unwrap();

    cmdb.rename_level(1, "Hosts").unwrap();
    assert_eq!(cmdb.level_index("Hosts"), Some(1));

    assert!(cmdb.rename_level(5, "x").unwrap_err().is_not_found());
    assert!(matches!(
        cmdb.rename_level(0, "Hosts"),
        Err(CmdbError::Validation { .. })
    ));
}

#[test]
fn test_remove_level_in_use_fails() {
    let cmdb = empty_store();
    cmdb.add_levels(&["L0", "L1"]).unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T").with_level(1)).unwrap();

    let err = cmdb.remove_level(1).unwrap_err();
    assert!(matches!(err, CmdbError::LevelInUse { index: 1, ci_count: 1 }));
    assert_eq!(cmdb.levels(), vec!["L0", "L1"]);

    assert_eq!(cmdb.remove_level(0).unwrap(), "L0");
    assert_eq!(cmdb.levels(), vec!["L1"]);
}

#[test]
fn test_remove_level_keeps_level_names_of_cis_above() {
    let cmdb = empty_store();
    cmdb.add_levels(&["L0", "L1", "L2"]).unwrap();
    cmdb.add_ci(Ci::new("low", "Low", "T").with_level(0)).unwrap();
    cmdb.add_ci(Ci::new("high", "High", "T").with_level(2)).unwrap();

    cmdb.remove_level(1).unwrap();

    let high = cmdb.get_ci("high").unwrap();
    assert_eq!(high.level(), 1);
    assert_eq!(cmdb.level_name(high.level()).as_deref(), Some("L2"));
    assert_eq!(cmdb.get_ci("low").unwrap().level(), 0);
}

#[test]
fn test_set_levels_only_without_cis() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.set_levels(&["A", "B"]).unwrap();
    assert_eq!(cmdb.levels(), vec!["A", "B"]);

    cmdb.add_ci(Ci::new("C1", "N1", "T")).unwrap();
    let err = cmdb.set_levels(&["X"]).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(cmdb.levels(), vec!["A", "B"]);
}

#[test]
fn test_add_ci_rejects_duplicates_and_empty_ids() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T")).unwrap();

    let err = cmdb.add_ci(Ci::new("C1", "Other", "T")).unwrap_err();
    assert!(matches!(err, CmdbError::DuplicateCi { .. }));
    assert_eq!(cmdb.get_ci("C1").unwrap().name(), "N1");

    assert!(matches!(
        cmdb.add_ci(Ci::new("", "Nameless", "T")),
        Err(CmdbError::Validation { .. })
    ));
    assert_eq!(cmdb.ci_count(), 1);
}

#[test]
fn test_id_index_tracks_add_and_remove() {
    let cmdb = Cmdb::in_memory().unwrap();
    for i in 0..10 {
        cmdb.add_ci(Ci::new(format!("ci-{i}"), "N", "T")).unwrap();
    }
    for i in (0..10).step_by(3) {
        cmdb.remove_ci(&format!("ci-{i}")).unwrap();
    }

    for i in 0..10 {
        let id = format!("ci-{i}");
        assert_eq!(cmdb.contains_ci(&id), i % 3 != 0, "{id}");
        assert_eq!(cmdb.get_ci(&id).is_ok(), i % 3 != 0, "{id}");
    }
    assert_eq!(cmdb.get_cis().len(), 6);
    assert_eq!(ids(&cmdb.get_cis())[0], "ci-1");
}

#[test]
fn test_remove_unknown_ci() {
    let cmdb = Cmdb::in_memory().unwrap();
    assert!(cmdb.remove_ci("ghost").unwrap_err().is_not_found());
}

#[test]
fn test_remove_ci_cascades_to_relationships_and_properties() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T").with_property("env", "prod")).unwrap();
    cmdb.add_ci(Ci::new("b", "B", "T")).unwrap();
    cmdb.add_ci(Ci::new("c", "C", "T")).unwrap();
    cmdb.add_relationship("a", "b", "uses").unwrap();
    cmdb.add_relationship("c", "a", "uses").unwrap();
    cmdb.add_relationship("c", "b", "uses").unwrap();

    cmdb.remove_ci("a").unwrap();

    assert_eq!(cmdb.relationship_count(), 1);
    assert!(cmdb.get_relationships().iter().all(|rel| !rel.touches("a")));
    assert!(cmdb.get_dependent_cis("a").is_empty());
    assert_eq!(cmdb.get_dependent_cis("b").len(), 1);
    assert!(cmdb.property_names().is_empty());
    assert!(cmdb.get_cis_with_properties(&["env"]).is_empty());
}

#[test]
fn test_property_index_scenario() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T")).unwrap();

    assert!(cmdb.set_property("C1", "env", Some("prod")).unwrap());
    assert_eq!(ids(&cmdb.get_cis_with_properties(&["env"])), vec!["C1"]);

    assert!(cmdb.set_property("C1", "env", None).unwrap());
    assert!(cmdb.get_cis_with_properties(&["env"]).is_empty());
    assert!(!cmdb.property_names().contains(&"env".to_string()));
}

#[test]
fn test_get_cis_with_properties_intersection() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("both", "B", "T").with_property("p1", "x").with_property("p2", "y"))
        .unwrap();
    cmdb.add_ci(Ci::new("one", "O", "T").with_property("p1", "x")).unwrap();

    assert_eq!(ids(&cmdb.get_cis_with_properties(&["p1", "p2"])), vec!["both"]);
    assert_eq!(cmdb.get_cis_with_properties(&["p1"]).len(), 2);
    assert!(cmdb.get_cis_with_properties(&["p1", "nobody"]).is_empty());
}

#[test]
fn test_update_ci_reconciles_property_index() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T").with_property("old", "1")).unwrap();

    let update = CiUpdate::new().name("Renamed").unset("old").set("new", "2");
    assert!(cmdb.update_ci("C1", &update).unwrap());

    let ci = cmdb.get_ci("C1").unwrap();
    assert_eq!(ci.name(), "Renamed");
    assert_eq!(cmdb.property_names(), vec!["new"]);
    assert!(cmdb.get_cis_with_properties(&["old"]).is_empty());
    assert!(!cmdb.update_ci("C1", &update).unwrap());
}

#[test]
fn test_update_ci_with_bad_level_changes_nothing() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T")).unwrap();

    let update = CiUpdate::new().name("Renamed").level(99);
    assert!(cmdb.update_ci("C1", &update).unwrap_err().is_not_found());
    assert_eq!(cmdb.get_ci("C1").unwrap().name(), "N1");
}

#[test]
fn test_apply_json_update() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T")).unwrap();

    let (id, changed) = cmdb
        .apply_json_update(&serde_json::json!({"id": "C1", "level": 2, "properties": {"a": "1"}}))
        .unwrap();
    assert_eq!(id, "C1");
    assert!(changed);
    assert_eq!(cmdb.get_ci("C1").unwrap().level(), 2);

    let err = cmdb
        .apply_json_update(&serde_json::json!({"id": "C1", "name": "X", "properties": {"a": 1}}))
        .unwrap_err();
    assert!(matches!(err, CmdbError::Validation { .. }));
    assert_eq!(cmdb.get_ci("C1").unwrap().name(), "N1");
}

#[test]
fn test_replace_properties_and_replace_ci() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("C1", "N1", "T").with_property("a", "1")).unwrap();

    assert!(cmdb
        .replace_properties("C1", PropertyMap::new().with("b", "2"))
        .unwrap());
    assert_eq!(cmdb.property_names(), vec!["b"]);

    assert!(cmdb
        .replace_ci("C1", "N2", 3, PropertyMap::new().with("c", "3"))
        .unwrap());
    let ci = cmdb.get_ci("C1").unwrap();
    assert_eq!((ci.name(), ci.level()), ("N2", 3));
    assert_eq!(cmdb.property_names(), vec!["c"]);

    assert!(cmdb.replace_ci("C1", "N2", 9, PropertyMap::new()).is_err());
    assert!(cmdb.replace_properties("ghost", PropertyMap::new()).is_err());
}

#[test]
fn test_level_queries() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("app", "A", "Application").with_level(1)).unwrap();
    cmdb.add_ci(Ci::new("srv", "S", "Server").with_level(3)).unwrap();
    cmdb.add_ci(Ci::new("vm", "V", "Server").with_level(2)).unwrap();

    assert_eq!(ids(&cmdb.get_cis_at_level(3)), vec!["srv"]);
    assert_eq!(ids(&cmdb.get_cis_of_type("Server")), vec!["srv", "vm"]);
    assert_eq!(ids(&cmdb.get_cis_at_level_of_type(2, "Server")), vec!["vm"]);
    assert!(cmdb.get_cis_at_level_of_type(1, "Server").is_empty());
}

#[test]
fn test_add_relationship_requires_both_endpoints() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();

    let err = cmdb.add_relationship("a", "ghost", "uses").unwrap_err();
    assert!(matches!(err, CmdbError::CiNotFound { ref id } if id == "ghost"));
    assert_eq!(cmdb.relationship_count(), 0);
}

#[test]
fn test_duplicate_relationships_are_kept() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();
    cmdb.add_ci(Ci::new("b", "B", "T")).unwrap();
    cmdb.add_relationship("a", "b", "uses").unwrap();
    cmdb.add_relationship("a", "b", "uses").unwrap();
    cmdb.add_weighted_relationship("a", "b", "uses", 3.0).unwrap();

    assert_eq!(cmdb.get_relationships_between("a", "b").len(), 3);

    // Removing one of several edges keeps the reverse index entry.
    cmdb.remove_relationship("a", "b").unwrap();
    assert_eq!(cmdb.get_dependent_cis("b").len(), 2);
}

#[test]
fn test_remove_relationship_typed() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();
    cmdb.add_ci(Ci::new("b", "B", "T")).unwrap();
    cmdb.add_relationship("a", "b", "uses").unwrap();
    cmdb.add_relationship("a", "b", "hosts").unwrap();

    let removed = cmdb.remove_relationship_typed("a", "b", "hosts").unwrap();
    assert_eq!(removed.rel_type(), "hosts");
    assert_eq!(cmdb.get_relationships_from("a").len(), 1);

    let err = cmdb.remove_relationship_typed("a", "b", "hosts").unwrap_err();
    assert!(matches!(err, CmdbError::RelationshipNotFound { .. }));
}

#[test]
fn test_remove_relationships_by_filter() {
    let cmdb = Cmdb::in_memory().unwrap();
    for id in ["a", "b", "c"] {
        cmdb.add_ci(Ci::new(id, id, "T")).unwrap();
    }
    cmdb.add_relationship("a", "b", "uses").unwrap();
    cmdb.add_relationship("a", "c", "uses").unwrap();
    cmdb.add_relationship("b", "c", "uses").unwrap();

    let removed = cmdb.remove_relationships(&RelationshipFilter::new().destination("c"));
    assert_eq!(removed, 2);
    assert!(cmdb.get_dependent_cis("c").is_empty());
    assert_eq!(cmdb.relationship_count(), 1);

    assert_eq!(
        cmdb.remove_relationships(&RelationshipFilter::new().source("a").rel_type("hosts")),
        0
    );
}

#[test]
fn test_traversal_at_distance() {
    let cmdb = Cmdb::in_memory().unwrap();
    for id in ["A", "B", "C", "D"] {
        cmdb.add_ci(Ci::new(id, id, "T")).unwrap();
    }
    cmdb.add_relationship("A", "B", "uses").unwrap();
    cmdb.add_relationship("A", "C", "uses").unwrap();
    cmdb.add_relationship("B", "D", "uses").unwrap();
    cmdb.add_relationship("B", "A", "uses").unwrap();

    assert_eq!(ids(&cmdb.get_cis_at_distance("A", 1)), vec!["B", "C"]);
    assert_eq!(ids(&cmdb.get_cis_at_distance("A", 2)), vec!["D"]);
    assert!(cmdb.get_cis_at_distance("A", 0).is_empty());
    assert!(cmdb.get_cis_at_distance("A", 5).is_empty());
    assert!(cmdb.get_cis_at_distance("ghost", 1).is_empty());
}

#[test]
fn test_clear_keeps_levels() {
    let cmdb = Cmdb::in_memory().unwrap();
    cmdb.add_ci(Ci::new("a", "A", "T")).unwrap();
    cmdb.add_ci(Ci::new("b", "B", "T")).unwrap();
    cmdb.add_relationship("a", "b", "uses").unwrap();

    cmdb.clear();

    assert_eq!(cmdb.ci_count(), 0);
    assert_eq!(cmdb.relationship_count(), 0);
    assert_eq!(cmdb.level_count(), 4);
}
