//! Test that saving an existing record merges into it.

use serde_json::json;

use crate::acl::{FieldAccessMode, FieldAcl, FieldAclEntry, FieldUserRole, RecordAcl};
use crate::e2e_tests::helpers::{TestEngine, master, results, user};
use crate::storage::Storage;
use crate::types::RecordId;

#[test]
fn test_second_save_merges_fields() {
    let mut test = TestEngine::new();

    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "k1": "v1"}]}))
        .unwrap();
    test.clock.advance(60_000);
    let response = test
        .save(&user("user0"), &json!({"records": [{"_id": "note/0", "k2": "v2"}]}))
        .unwrap();
    let record = &results(&response)[0];

    assert_eq!(record["k1"], "v1");
    assert_eq!(record["k2"], "v2");
    assert_eq!(record["_created_at"], "2023-11-14T22:13:20Z");
    assert_eq!(record["_updated_at"], "2023-11-14T22:14:20Z");
}

#[test]
fn test_update_by_another_user_keeps_creator() {
    let mut test = TestEngine::new();

    test.save(
        &user("user0"),
        &json!({"records": [{
            "_id": "note/0",
            "_access": [{"public": true, "level": "write"}],
            "k1": "v1",
        }]}),
    )
    .unwrap();
    let response = test
        .save(&user("user1"), &json!({"records": [{"_id": "note/0", "k1": "v2"}]}))
        .unwrap();
    let record = &results(&response)[0];

    assert_eq!(record["k1"], "v2");
    assert_eq!(record["_ownerID"], "user0");
    assert_eq!(record["_created_by"], "user0");
    assert_eq!(record["_updated_by"], "user1");
    assert_eq!(record["_access"], json!([{"public": true, "level": "write"}]));
}

#[test]
fn test_update_without_write_access_is_denied() {
    let mut test = TestEngine::new();

    test.save(
        &user("user0"),
        &json!({"records": [{
            "_id": "note/0",
            "_access": [{"public": true, "level": "read"}],
            "k1": "v1",
        }]}),
    )
    .unwrap();
    let response = test
        .save(&user("user1"), &json!({"records": [{"_id": "note/0", "k1": "v2"}]}))
        .unwrap();
    assert_eq!(results(&response)[0]["name"], "PermissionDenied");

    let response = test
        .save(&master("user1"), &json!({"records": [{"_id": "note/0", "k1": "v3"}]}))
        .unwrap();
    assert_eq!(results(&response)[0]["k1"], "v3");
}

#[test]
fn test_unwritable_fields_are_dropped() {
    let mut test = TestEngine::new();
    test.policy.set_field_acl(FieldAcl::new(vec![
        FieldAclEntry::new("note", "locked", FieldUserRole::Public).deny(FieldAccessMode::Writable),
    ]));

    let response = test
        .save(
            &user("user0"),
            &json!({"records": [{"_id": "note/0", "locked": "x", "open": "y"}]}),
        )
        .unwrap();
    let record = &results(&response)[0];
    assert!(record.get("locked").is_none());
    assert_eq!(record["open"], "y");

    let response = test
        .save(
            &master("user0"),
            &json!({"records": [{"_id": "note/0", "locked": "x"}]}),
        )
        .unwrap();
    assert_eq!(results(&response)[0]["locked"], "x");
}

#[test]
fn test_null_access_resets_to_public() {
    let mut test = TestEngine::new();
    test.save(
        &user("user0"),
        &json!({"records": [{"_id": "note/0", "_access": [], "k1": "v1"}]}),
    )
    .unwrap();
    let response = test.fetch(&user("user1"), &json!({"ids": ["note/0"]})).unwrap();
    assert_eq!(results(&response)[0]["name"], "PermissionDenied");

    // Omitting _access keeps the stored ACL.
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "k1": "v2"}]}))
        .unwrap();
    let response = test.fetch(&user("user1"), &json!({"ids": ["note/0"]})).unwrap();
    assert_eq!(results(&response)[0]["name"], "PermissionDenied");

    test.save(
        &user("user0"),
        &json!({"records": [{"_id": "note/0", "_access": null}]}),
    )
    .unwrap();
    let response = test.fetch(&user("user1"), &json!({"ids": ["note/0"]})).unwrap();
    assert_eq!(results(&response)[0]["k1"], "v2");

    let stored = test.storage.get(&RecordId::new("note", "0")).unwrap();
    assert_eq!(stored.acl, Some(RecordAcl::public()));
}
