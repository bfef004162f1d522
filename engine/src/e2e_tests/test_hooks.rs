//! Test hook invocation around saves.

use serde_json::json;

use crate::e2e_tests::helpers::{TestEngine, results, user};
use crate::hooks::HookPhase;
use crate::testing::RecordingHooks;
use crate::types::{RecordId, Value};

#[test]
fn test_before_save_changes_are_persisted() {
    let mut test = TestEngine::with_hooks(
        RecordingHooks::new().set_before_save("reviewed", Value::Boolean(false)),
    );

    let response = test
        .save(&user("user0"), &json!({"records": [{"_id": "note/0", "k": "v"}]}))
        .unwrap();
    assert_eq!(results(&response)[0]["reviewed"], false);

    let stored = test.storage.contains(&RecordId::new("note", "0"));
    assert!(stored);
}

#[test]
fn test_hooks_see_the_original_record() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "k": "v1"}]}))
        .unwrap();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "k": "v2"}]}))
        .unwrap();

    let calls = test.hooks.calls();
    let before_saves: Vec<_> = calls
        .iter()
        .filter(|call| call.phase == HookPhase::BeforeSave)
        .collect();
    assert_eq!(before_saves.len(), 2);
    assert!(before_saves[0].original.is_none());

    let second = before_saves[1];
    let original = second.original.as_ref().unwrap();
    assert_eq!(original.data["k"], Value::String("v1".to_owned()));
    assert_eq!(second.record.data["k"], Value::String("v2".to_owned()));
}

#[test]
fn test_after_save_error_does_not_fail_request() {
    let id = RecordId::new("note", "0");
    let mut test =
        TestEngine::with_hooks(RecordingHooks::new().fail_on(HookPhase::AfterSave, id.clone()));

    let response = test
        .save(
            &user("user0"),
            &json!({"atomic": true, "records": [{"_id": "note/0", "k": "v"}]}),
        )
        .unwrap();
    assert_eq!(results(&response)[0]["_type"], "record");
    assert!(test.storage.contains(&id));
}

#[test]
fn test_before_save_error_skips_after_save() {
    let id = RecordId::new("note", "0");
    let mut test =
        TestEngine::with_hooks(RecordingHooks::new().fail_on(HookPhase::BeforeSave, id.clone()));

    let response = test
        .save(&user("user0"), &json!({"records": [{"_id": "note/0"}]}))
        .unwrap();
    assert_eq!(results(&response)[0]["_type"], "error");
    assert_eq!(test.hooks.phases_for(&id), vec![HookPhase::BeforeSave]);
}
