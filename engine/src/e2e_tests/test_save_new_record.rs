//! Test saving a record that does not exist yet.

use serde_json::json;

use crate::acl::{AccessLevel, RecordAcl, RecordAclEntry};
use crate::e2e_tests::helpers::{TestEngine, results, user};

#[test]
fn test_new_record_is_stamped_with_owner() {
    let mut test = TestEngine::new();

    let response = test
        .save(&user("user0"), &json!({"records": [{"_id": "note/0", "k1": "v1"}]}))
        .unwrap();
    let record = &results(&response)[0];

    assert_eq!(record["_id"], "note/0");
    assert_eq!(record["_type"], "record");
    assert_eq!(record["_ownerID"], "user0");
    assert_eq!(record["_created_by"], "user0");
    assert_eq!(record["_updated_by"], "user0");
    assert_eq!(record["k1"], "v1");
    assert_eq!(record["_created_at"], "2023-11-14T22:13:20Z");
    assert_eq!(record["_created_at"], record["_updated_at"]);
}

#[test]
fn test_new_record_gets_default_access() {
    let mut test = TestEngine::new();
    test.policy.set_default_access(
        "note",
        RecordAcl::new(vec![RecordAclEntry::public(AccessLevel::Read)]),
    );

    let response = test
        .save(
            &user("user0"),
            &json!({"records": [
                {"_id": "note/0"},
                {"_id": "note/1", "_access": [{"role": "admin", "level": "write"}]},
            ]}),
        )
        .unwrap();
    let result = results(&response);

    assert_eq!(result[0]["_access"], json!([{"public": true, "level": "read"}]));
    assert_eq!(result[1]["_access"], json!([{"role": "admin", "level": "write"}]));
}

#[test]
fn test_create_access_denied() {
    let mut test = TestEngine::new();
    test.policy.set_creation_access(
        "note",
        RecordAcl::new(vec![RecordAclEntry::role("writer", AccessLevel::Create)]),
    );

    let response = test
        .save(&user("user0"), &json!({"records": [{"_id": "note/0"}]}))
        .unwrap();
    let record = &results(&response)[0];

    assert_eq!(record["_type"], "error");
    assert_eq!(record["_id"], "note/0");
    assert_eq!(record["name"], "PermissionDenied");
    assert!(test.storage.is_empty());
}

#[test]
fn test_save_without_user_is_rejected() {
    let mut test = TestEngine::new();
    let err = test
        .save(
            &crate::context::RequestContext::anonymous(),
            &json!({"records": [{"_id": "note/0"}]}),
        )
        .unwrap_err();
    assert_eq!(err.to_json()["name"], "NotAuthenticated");
}
