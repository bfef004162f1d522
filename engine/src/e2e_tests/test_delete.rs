//! Test deleting records.

use serde_json::json;

use crate::e2e_tests::helpers::{TestEngine, master, results, user};
use crate::error::ErrorKind;
use crate::hooks::HookPhase;
use crate::testing::RecordingHooks;
use crate::types::RecordId;

#[test]
fn test_delete_runs_hooks_around_removal() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "k": "v"}]}))
        .unwrap();

    let response = test
        .delete(&user("user0"), &json!({"ids": ["note/0"]}))
        .unwrap();
    assert_eq!(results(&response)[0], json!({"_id": "note/0", "_type": "record"}));
    assert!(test.storage.is_empty());

    let id = RecordId::new("note", "0");
    assert_eq!(
        test.hooks.phases_for(&id),
        vec![
            HookPhase::BeforeSave,
            HookPhase::AfterSave,
            HookPhase::BeforeDelete,
            HookPhase::AfterDelete,
        ]
    );
}

#[test]
fn test_before_delete_hook_error_keeps_record() {
    let id = RecordId::new("note", "0");
    let mut test = TestEngine::with_hooks(
        RecordingHooks::new().fail_on(HookPhase::BeforeDelete, id.clone()),
    );
    test.save(
        &user("user0"),
        &json!({"records": [{"_id": "note/0"}, {"_id": "note/1"}]}),
    )
    .unwrap();

    let response = test
        .delete(&user("user0"), &json!({"ids": ["note/0", "note/1"]}))
        .unwrap();
    let result = results(&response);
    assert_eq!(result[0]["_type"], "error");
    assert_eq!(result[1]["_type"], "record");
    assert!(test.storage.contains(&id));
    assert!(!test.storage.contains(&RecordId::new("note", "1")));
    assert!(!test.hooks.phases_for(&id).contains(&HookPhase::AfterDelete));
}

#[test]
fn test_user_records_cannot_be_deleted() {
    let mut test = TestEngine::new();
    test.save(&user("alice"), &json!({"records": [{"_id": "user/alice"}]}))
        .unwrap();

    let err = test
        .delete(&master("alice"), &json!({"ids": ["note/0", "user/alice"]}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(test.storage.contains(&RecordId::new("user", "alice")));
}

#[test]
fn test_atomic_delete_of_missing_record_rolls_back() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0"}]}))
        .unwrap();

    let err = test
        .delete(
            &user("user0"),
            &json!({"ids": ["note/0", "note/404"], "atomic": true}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AtomicOperationFailure);
    assert_eq!(err.info().unwrap()["note/404"]["name"], "ResourceNotFound");
    assert!(test.storage.contains(&RecordId::new("note", "0")));
}

#[test]
fn test_bad_ids_are_reported_per_item() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0"}]}))
        .unwrap();

    let response = test
        .delete(&user("user0"), &json!({"ids": ["bogus", "note/0"]}))
        .unwrap();
    let result = results(&response);
    assert_eq!(result[0]["name"], "InvalidArgument");
    assert_eq!(result[0]["_id"], "bogus");
    assert_eq!(result[1]["_type"], "record");
}
