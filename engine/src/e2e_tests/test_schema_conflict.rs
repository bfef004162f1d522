//! Test schema extension and conflicts with the stored schema.

use serde_json::json;

use crate::e2e_tests::helpers::{TestEngine, results, user};
use crate::error::ErrorKind;
use crate::schema::FieldType;
use crate::storage::Storage;

#[test]
fn test_save_extends_stored_schema() {
    let mut test = TestEngine::new();
    test.save(
        &user("user0"),
        &json!({"records": [
            {"_id": "note/0", "title": "t", "rank": 1,
                "due": {"$type": "date", "$date": "2024-01-02T03:04:05Z"}},
            {"_id": "note/1", "category": {"$type": "ref", "$id": "category/c1"}, "tags": ["a"]},
        ]}),
    )
    .unwrap();

    let schema = test.storage.get_schema("note").unwrap();
    assert_eq!(schema.get("title"), Some(&FieldType::String));
    assert_eq!(schema.get("rank"), Some(&FieldType::Number));
    assert_eq!(schema.get("due"), Some(&FieldType::DateTime));
    assert_eq!(
        schema.get("category"),
        Some(&FieldType::Reference("category".to_owned()))
    );
    assert_eq!(schema.get("tags"), Some(&FieldType::Json));
}

#[test]
fn test_conflict_with_stored_schema_aborts_batch() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "a": "text"}]}))
        .unwrap();

    let err = test
        .save(
            &user("user0"),
            &json!({"records": [{"_id": "note/1", "b": "ok"}, {"_id": "note/2", "a": 5}]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleSchema);
    assert_eq!(test.storage.len(), 1);
    assert_eq!(test.storage.get_schema("note").unwrap().get("b"), None);
}

#[test]
fn test_same_type_twice_is_fine() {
    let mut test = TestEngine::new();
    let response = test
        .save(
            &user("user0"),
            &json!({"records": [{"_id": "note/0", "a": "x"}, {"_id": "note/1", "a": "y"}]}),
        )
        .unwrap();
    assert_eq!(results(&response).len(), 2);
    assert_eq!(test.storage.len(), 2);
}
