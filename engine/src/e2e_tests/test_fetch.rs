//! Test fetching records by ID.

use serde_json::json;

use crate::acl::{FieldAccessMode, FieldAcl, FieldAclEntry, FieldUserRole};
use crate::context::RequestContext;
use crate::e2e_tests::helpers::{TestEngine, results, user};

#[test]
fn test_fetch_honours_record_and_field_acl() {
    let mut test = TestEngine::new();
    test.save(
        &user("alice"),
        &json!({"records": [
            {"_id": "note/0", "_access": [], "title": "private"},
            {"_id": "note/1", "_access": [{"public": true, "level": "read"}],
                "title": "shared", "diary": "secret"},
        ]}),
    )
    .unwrap();
    test.policy.set_field_acl(FieldAcl::new(vec![
        FieldAclEntry::new("note", "diary", FieldUserRole::Owner),
        FieldAclEntry::new("note", "diary", FieldUserRole::Public).deny(FieldAccessMode::Readable),
    ]));

    let response = test
        .fetch(
            &RequestContext::anonymous(),
            &json!({"ids": ["note/0", "note/1", "note/2"]}),
        )
        .unwrap();
    let result = results(&response);
    assert_eq!(result[0]["name"], "PermissionDenied");
    assert_eq!(result[1]["title"], "shared");
    assert!(result[1].get("diary").is_none());
    assert_eq!(result[2]["name"], "ResourceNotFound");

    let response = test
        .fetch(&user("alice"), &json!({"ids": ["note/0", "note/1"]}))
        .unwrap();
    let result = results(&response);
    assert_eq!(result[0]["title"], "private");
    assert_eq!(result[1]["diary"], "secret");
}

#[test]
fn test_fetch_needs_ids() {
    let mut test = TestEngine::new();
    let err = test.fetch(&user("alice"), &json!({"ids": []})).unwrap_err();
    assert_eq!(err.info().unwrap()["arguments"], json!(["ids"]));
}
