//! Test eager loading of referenced records into `_transient`.

use serde_json::json;

use crate::e2e_tests::helpers::{TestEngine, keypath, results, user};

fn seeded() -> TestEngine {
    let mut test = TestEngine::new();
    let ctx = user("alice");
    test.save(
        &ctx,
        &json!({"records": [
            {"_id": "user/alice", "name": "Alice"},
            {"_id": "category/c1", "name": "Work"},
        ]}),
    )
    .unwrap();
    test.save(
        &ctx,
        &json!({"records": [
            {"_id": "note/0", "category": {"$type": "ref", "$id": "category/c1"}},
            {"_id": "note/1", "category": null},
            {"_id": "note/2"},
        ]}),
    )
    .unwrap();
    test
}

#[test]
fn test_reference_is_loaded_and_missing_is_null() {
    let mut test = seeded();

    let response = test
        .query(
            &user("alice"),
            &json!({"record_type": "note", "include": {"category": keypath("category")}}),
        )
        .unwrap();
    let result = results(&response);
    assert_eq!(result.len(), 3);

    let loaded = &result[0]["_transient"]["category"];
    assert_eq!(loaded["_id"], "category/c1");
    assert_eq!(loaded["name"], "Work");

    for record in &result[1..] {
        let transient = record["_transient"].as_object().unwrap();
        assert_eq!(transient.get("category"), Some(&serde_json::Value::Null));
    }
}

#[test]
fn test_owner_is_loaded_as_user_record() {
    let mut test = seeded();

    let response = test
        .query(
            &user("alice"),
            &json!({
                "record_type": "note",
                "predicate": ["eq", keypath("_id"), "0"],
                "include": {"owner": keypath("_owner_id")},
            }),
        )
        .unwrap();
    let owner = &results(&response)[0]["_transient"]["owner"];
    assert_eq!(owner["_id"], "user/alice");
    assert_eq!(owner["name"], "Alice");
}

#[test]
fn test_keypath_across_reference() {
    let mut test = seeded();

    let response = test
        .query(
            &user("alice"),
            &json!({
                "record_type": "note",
                "predicate": ["eq", keypath("category.name"), "Work"],
                "include": {"category_name": keypath("category.name")},
            }),
        )
        .unwrap();
    let result = results(&response);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["_transient"]["category_name"], "Work");
}
