// SPDX-License-Identifier: Apache-2.0

//! End-to-end flows over an in-memory store: create a registry, shape its
//! model, save, reload, reconcile.

use serde_json::json;
use xregistry_model::{
    canonical_schema, Attribute, AttrType, Item, Model, Registry, SPEC_VERSION,
};
use xregistry_store::MemStore;

fn new_registry(uid: &str) -> (Registry, Model) {
    Registry::create(Box::new(MemStore::new()), uid).expect("create registry")
}

fn user_json(model: &Model) -> serde_json::Value {
    serde_json::to_value(model).expect("serialize model")
}

#[test]
fn test_create_registry_with_group_and_resource() {
    let (mut reg, mut model) = new_registry("test-create");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");
    let _ = model
        .add_resource_model(&mut reg, "dirs", "files", "file", 0, true, true, true)
        .expect("add resource");

    let out = user_json(&model);
    assert_eq!(out["groups"]["dirs"]["plural"], json!("dirs"));
    assert_eq!(out["groups"]["dirs"]["singular"], json!("dir"));
    assert_eq!(
        out["groups"]["dirs"]["resources"]["files"]["versions"],
        json!(0)
    );
    assert_eq!(
        out["groups"]["dirs"]["resources"]["files"]["versionid"],
        json!(true)
    );
    assert_eq!(
        out["groups"]["dirs"]["resources"]["files"]["hasdocument"],
        json!(true)
    );

    // the canonical schema is there exactly once
    assert_eq!(
        model
            .schemas
            .iter()
            .filter(|s| **s == canonical_schema())
            .count(),
        1
    );
}

#[test]
fn test_duplicate_group_names_are_rejected() {
    let (mut reg, mut model) = new_registry("test-dups");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");
    let err = model
        .add_group_model(&mut reg, "dirs", "dir2")
        .expect_err("dup plural");
    assert_eq!(err.to_string(), r#"GroupModel plural "dirs" already exists"#);
    let err = model
        .add_group_model(&mut reg, "folders", "dir")
        .expect_err("dup singular");
    assert_eq!(
        err.to_string(),
        r#"GroupModel singular "dir" already exists"#
    );

    let _ = model
        .add_resource_model(&mut reg, "dirs", "files", "file", 0, true, true, true)
        .expect("add resource");
    let err = model
        .add_resource_model(&mut reg, "dirs", "files", "doc", 0, true, true, true)
        .expect_err("dup resource plural");
    assert_eq!(
        err.to_string(),
        r#"Resource model plural "files" already exists for group "dirs""#
    );

    let err = model
        .add_resource_model(&mut reg, "dirs", "docs", "doc", -3, true, true, true)
        .expect_err("negative versions");
    assert_eq!(err.to_string(), "'versions'(-3) must be >= 0");
}

#[test]
fn test_client_required_needs_server_required() {
    let (mut reg, mut model) = new_registry("test-clireq");

    let mut attr = Attribute::new("clireq", AttrType::String);
    attr.client_required = true;
    attr.server_required = false;
    let err = model
        .add_attribute(&mut reg, attr)
        .expect_err("clientrequired without serverrequired");
    assert_eq!(
        err.to_string(),
        r#""model.clireq" must have "serverrequired" since "clientrequired" is "true""#
    );

    let mut attr = Attribute::new("clireq", AttrType::String);
    attr.client_required = true;
    attr.server_required = true;
    let added = model.add_attribute(&mut reg, attr).expect("valid attribute");
    assert_eq!(added.name, "clireq");
}

#[test]
fn test_enum_member_type_mismatch_via_model_save() {
    let (mut reg, mut model) = new_registry("test-enum");

    let mut attr = Attribute::new("x", AttrType::Integer);
    attr.enum_values = Some(vec![json!(1), json!("two")]);
    let err = model.add_attribute(&mut reg, attr).expect_err("bad enum");
    assert_eq!(
        err.to_string(),
        r#""model.x" enum value "two" must be of type "integer""#
    );
}

#[test]
fn test_save_failure_restores_last_persisted_model() {
    let (mut reg, mut model) = new_registry("test-atomic");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");
    let before = user_json(&model);

    // a map without an item can't verify; the save must fail and the
    // in-memory model revert to what storage holds
    let bad = Attribute::new("broken", AttrType::Map);
    let err = model.add_attribute(&mut reg, bad).expect_err("invalid map");
    assert_eq!(
        err.to_string(),
        r#""model.broken" must have an "item" section"#
    );

    assert!(model.attributes.get("broken").is_none());
    assert_eq!(before, user_json(&model));
    assert!(model.group("dirs").is_some());
}

#[test]
fn test_load_reconstructs_the_saved_tree() {
    let (mut reg, mut model) = new_registry("test-load");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");
    let _ = model
        .add_resource_model(&mut reg, "dirs", "files", "file", 5, false, true, false)
        .expect("add resource");
    let _ = model
        .add_group_attribute(&mut reg, "dirs", Attribute::new("owner", AttrType::String))
        .expect("group attr");
    let _ = model
        .add_resource_attribute(
            &mut reg,
            "dirs",
            "files",
            Attribute::map("tags", Item::of_type(AttrType::String)),
        )
        .expect("resource attr");
    let _ = model
        .add_attr_map(&mut reg, "labels2", Item::of_type(AttrType::String))
        .expect("registry attr");

    let loaded = Model::load(&mut reg).expect("load");
    assert_eq!(user_json(&model), user_json(&loaded));
    assert_eq!(model, loaded);

    let files = loaded
        .group("dirs")
        .and_then(|gm| gm.resource("files"))
        .expect("files kind");
    assert_eq!(files.versions, 5);
    assert!(!files.version_id);
    assert!(!files.has_document);
    assert_eq!(files.sid(), model.group("dirs").expect("dirs").resource("files").expect("files").sid());
}

#[test]
fn test_registry_find_round_trips_the_model() {
    let store = Box::new(MemStore::new());
    let (mut reg, mut model) = Registry::create(store, "test-find").expect("create");
    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");

    // hand the (committed) store to a fresh handle
    reg.commit().expect("commit");
    let snapshot = user_json(&model);
    drop(model);

    // Registry::find on a store with no such uid
    assert!(
        Registry::find(Box::new(MemStore::new()), "test-find")
            .expect("find on empty store")
            .is_none()
    );

    // the original handle still works; reload from it
    let reloaded = Model::load(&mut reg).expect("load");
    assert_eq!(snapshot, user_json(&reloaded));
}

#[test]
fn test_serialized_round_trip_is_byte_identical() {
    let (mut reg, mut model) = new_registry("test-roundtrip");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");
    let _ = model
        .add_resource_model(&mut reg, "dirs", "files", "file", 0, true, true, true)
        .expect("add resource");
    let mut env = Attribute::new("env", AttrType::String);
    env.enum_values = Some(vec![json!("dev"), json!("prod")]);
    env.strict = Some(false);
    let _ = model.add_attribute(&mut reg, env).expect("enum attr");

    let first = serde_json::to_vec_pretty(&model).expect("serialize");
    let parsed: Model = serde_json::from_slice(&first).expect("parse");
    let second = serde_json::to_vec_pretty(&parsed).expect("serialize again");
    assert_eq!(first, second);
}

#[test]
fn test_apply_new_model_reconciles_and_preserves_sids() {
    let (mut reg, mut model) = new_registry("test-apply");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add dirs");
    let _ = model
        .add_resource_model(&mut reg, "dirs", "files", "file", 0, true, true, true)
        .expect("add files");
    let _ = model
        .add_group_model(&mut reg, "stale", "stal")
        .expect("add stale");
    let dirs_sid = model.group("dirs").expect("dirs").sid().to_owned();

    // the replacement drops "stale", keeps "dirs" (renaming its singular),
    // retunes "files", and adds a new group
    let new_model: Model = serde_json::from_value(json!({
        "schemas": ["urn:example:extra"],
        "groups": {
            "dirs": {
                "plural": "dirs",
                "singular": "directory",
                "resources": {
                    "files": {
                        "plural": "files",
                        "singular": "file",
                        "versions": 3,
                        "versionid": false,
                        "latest": true,
                        "hasdocument": true
                    }
                }
            },
            "envs": {
                "plural": "envs",
                "singular": "env"
            }
        }
    }))
    .expect("parse replacement");

    model
        .apply_new_model(&mut reg, new_model.clone())
        .expect("apply");

    assert!(model.group("stale").is_none());
    assert!(model.group("envs").is_some());
    let dirs = model.group("dirs").expect("dirs survived");
    assert_eq!(dirs.sid(), dirs_sid);
    assert_eq!(dirs.singular, "directory");
    let files = dirs.resource("files").expect("files survived");
    assert_eq!(files.versions, 3);
    assert!(!files.version_id);
    assert!(model.schemas.contains(&"urn:example:extra".to_owned()));
    assert!(model.schemas.contains(&canonical_schema()));

    // applying the same replacement again changes nothing
    let after_first = user_json(&model);
    let sid_after_first = model.group("envs").expect("envs").sid().to_owned();
    model
        .apply_new_model(&mut reg, new_model)
        .expect("apply again");
    assert_eq!(after_first, user_json(&model));
    assert_eq!(model.group("envs").expect("envs").sid(), sid_after_first);

    // and the persisted shape agrees
    let loaded = Model::load(&mut reg).expect("load");
    assert_eq!(after_first, user_json(&loaded));
}

#[test]
fn test_schema_list_verbs() {
    let (mut reg, mut model) = new_registry("test-schemas");

    model
        .add_schema(&mut reg, "urn:example:a")
        .expect("add schema");
    // idempotent in memory
    assert_eq!(
        model.schemas,
        vec!["urn:example:a".to_owned(), canonical_schema()]
    );

    model
        .del_schema(&mut reg, "urn:example:a")
        .expect("del schema");
    assert_eq!(model.schemas, vec![canonical_schema()]);

    // deleting a schema that isn't there is fine
    model
        .del_schema(&mut reg, "urn:example:a")
        .expect("del absent schema");

    model
        .set_schemas(
            &mut reg,
            vec!["urn:example:b".to_owned(), "urn:example:a".to_owned()],
        )
        .expect("set schemas");
    assert_eq!(
        model.schemas,
        vec!["urn:example:a".to_owned(), "urn:example:b".to_owned()]
    );

    // verify restores the canonical entry
    model.verify().expect("verify");
    assert!(model.schemas.contains(&canonical_schema()));
}

#[test]
fn test_group_attribute_lifecycle() {
    let (mut reg, mut model) = new_registry("test-group-attrs");

    let _ = model
        .add_group_model(&mut reg, "dirs", "dir")
        .expect("add group");

    let err = model
        .add_group_attribute(&mut reg, "nope", Attribute::new("a", AttrType::String))
        .expect_err("unknown group");
    assert_eq!(err.to_string(), "Unknown Group type: nope");

    let err = model
        .add_group_attribute(&mut reg, "dirs", Attribute::new("BAD", AttrType::String))
        .expect_err("bad name");
    assert_eq!(err.to_string(), "Invalid attribute name: BAD");

    let _ = model
        .add_group_attribute(&mut reg, "dirs", Attribute::new("owner", AttrType::String))
        .expect("add");
    assert!(model
        .group("dirs")
        .expect("dirs")
        .attributes
        .get("owner")
        .is_some());

    model
        .del_group_attribute(&mut reg, "dirs", "owner")
        .expect("del");
    assert!(model
        .group("dirs")
        .expect("dirs")
        .attributes
        .get("owner")
        .is_none());
}

#[test]
fn test_spec_version_constant_is_serialized_in_schemas() {
    let (_reg, model) = new_registry("test-canonical");
    let out = user_json(&model);
    let schemas = out["schemas"].as_array().expect("schemas array");
    assert!(schemas
        .iter()
        .any(|s| s == &json!(format!("xRegistry-json/{SPEC_VERSION}"))));
}

#[test]
fn test_wildcard_extension_attribute() {
    let (mut reg, mut model) = new_registry("test-star");
    let added = model
        .add_attribute(&mut reg, Attribute::new("*", AttrType::Any))
        .expect("star attribute");
    assert_eq!(added.name, "*");
}
