//! Test atomic and non-atomic batch saves with one failing record.

use serde_json::json;

use crate::e2e_tests::helpers::{TestEngine, results, user};
use crate::error::ErrorKind;
use crate::hooks::HookPhase;
use crate::storage::Storage;
use crate::testing::RecordingHooks;
use crate::types::RecordId;

fn batch(atomic: bool) -> serde_json::Value {
    json!({
        "atomic": atomic,
        "records": [
            {"_id": "note/0", "k": "a"},
            {"_id": "note/1", "k": "b"},
            {"_id": "note/2", "k": "c"},
        ],
    })
}

fn failing_note_1() -> TestEngine {
    TestEngine::with_hooks(
        RecordingHooks::new().fail_on(HookPhase::BeforeSave, RecordId::new("note", "1")),
    )
}

#[test]
fn test_atomic_save_rolls_back_everything() {
    let mut test = failing_note_1();

    let err = test.save(&user("user0"), &batch(true)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AtomicOperationFailure);

    let info = err.info().unwrap();
    assert_eq!(info.len(), 1);
    assert_eq!(info["note/1"]["name"], "UnexpectedError");
    assert!(test.storage.is_empty());
    assert!(!test.storage.in_transaction());
    assert!(test.storage.get_schema("note").unwrap().is_empty());
}

#[test]
fn test_non_atomic_save_keeps_siblings() {
    let mut test = failing_note_1();

    let response = test.save(&user("user0"), &batch(false)).unwrap();
    let result = results(&response);

    assert_eq!(result[0]["_type"], "record");
    assert_eq!(result[1]["_type"], "error");
    assert_eq!(result[1]["_id"], "note/1");
    assert_eq!(result[2]["_type"], "record");
    assert!(test.storage.contains(&RecordId::new("note", "0")));
    assert!(!test.storage.contains(&RecordId::new("note", "1")));
    assert!(test.storage.contains(&RecordId::new("note", "2")));
}

#[test]
fn test_atomic_failure_keys_unidentified_items_by_position() {
    let mut test = TestEngine::new();

    let err = test
        .save(
            &user("user0"),
            &json!({"atomic": true, "records": [{"_id": "note/0"}, {"k": "no id"}]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AtomicOperationFailure);
    assert_eq!(err.info().unwrap()["#1"]["name"], "InvalidArgument");
    assert!(test.storage.is_empty());
}

#[test]
fn test_successful_atomic_save_commits() {
    let mut test = TestEngine::new();

    let response = test.save(&user("user0"), &batch(true)).unwrap();
    assert_eq!(results(&response).len(), 3);
    assert_eq!(test.storage.len(), 3);
    assert!(!test.storage.in_transaction());
}
