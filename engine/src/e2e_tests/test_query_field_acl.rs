//! Test field ACL checks on queries.

use serde_json::json;

use crate::acl::{FieldAccessMode, FieldAcl, FieldAclEntry, FieldUserRole};
use crate::e2e_tests::helpers::{TestEngine, keypath, master, results, user};
use crate::error::ErrorKind;

/// `tag` can be discovered but not compared.
fn discoverable_tag() -> TestEngine {
    let mut test = TestEngine::new();
    test.save(
        &user("user0"),
        &json!({"records": [
            {"_id": "note/0", "tag": "x", "title": "first"},
            {"_id": "note/1", "tag": "y", "title": "second"},
        ]}),
    )
    .unwrap();
    test.policy.set_field_acl(FieldAcl::new(vec![
        FieldAclEntry::new("note", "tag", FieldUserRole::Public).deny(FieldAccessMode::Comparable),
    ]));
    test
}

#[test]
fn test_simple_predicates_need_discoverable_only() {
    let mut test = discoverable_tag();

    let response = test
        .query(
            &user("user1"),
            &json!({
                "record_type": "note",
                "predicate": ["and",
                    ["eq", keypath("tag"), "x"],
                    ["in", keypath("tag"), ["x", "z"]],
                ],
            }),
        )
        .unwrap();
    let result = results(&response);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["_id"], "note/0");
}

#[test]
fn test_or_needs_comparable() {
    let mut test = discoverable_tag();

    let err = test
        .query(
            &user("user1"),
            &json!({
                "record_type": "note",
                "predicate": ["or",
                    ["eq", keypath("tag"), "x"],
                    ["eq", keypath("title"), "second"]],
            }),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecordQueryDenied);
    assert_eq!(err.info().unwrap()["field"], "tag");
    assert_eq!(err.info().unwrap()["access"], "comparable");
}

#[test]
fn test_sort_needs_comparable() {
    let mut test = discoverable_tag();

    let err = test
        .query(
            &user("user1"),
            &json!({"record_type": "note", "sort": [[keypath("tag"), "asc"]]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecordQueryDenied);

    let response = test
        .query(
            &master("user1"),
            &json!({"record_type": "note", "sort": [[keypath("tag"), "desc"]]}),
        )
        .unwrap();
    assert_eq!(results(&response)[0]["_id"], "note/1");
}

#[test]
fn test_reserved_fields_bypass_field_acl() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "title": "t"}]}))
        .unwrap();
    test.policy.set_field_acl(FieldAcl::new(vec![
        FieldAclEntry::new("*", "*", FieldUserRole::Public)
            .deny(FieldAccessMode::Readable)
            .deny(FieldAccessMode::Writable)
            .deny(FieldAccessMode::DiscoverableOrComparable),
    ]));

    let response = test
        .query(
            &user("user1"),
            &json!({
                "record_type": "note",
                "predicate": ["eq", keypath("_owner"), "user0"],
                "sort": [[keypath("_created_at"), "asc"]],
            }),
        )
        .unwrap();
    let record = &results(&response)[0];
    assert_eq!(record["_ownerID"], "user0");
    assert!(record.get("title").is_none());

    let err = test
        .query(
            &user("user1"),
            &json!({"record_type": "note", "predicate": ["eq", keypath("title"), "t"]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecordQueryDenied);
}

#[test]
fn test_keypath_through_non_reference_is_invalid() {
    let mut test = TestEngine::new();
    test.save(&user("user0"), &json!({"records": [{"_id": "note/0", "title": "t"}]}))
        .unwrap();

    let err = test
        .query(
            &user("user0"),
            &json!({"record_type": "note", "predicate": ["eq", keypath("title.name"), "t"]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecordQueryInvalid);
}

#[test]
fn test_malformed_query_names_the_argument() {
    let mut test = TestEngine::new();

    let err = test
        .query(&user("user0"), &json!({"record_type": "note", "limit": -1}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.info().unwrap()["arguments"], json!(["limit"]));

    let err = test
        .query(
            &user("user0"),
            &json!({"record_type": "note", "predicate": ["eq", keypath("title")]}),
        )
        .unwrap_err();
    assert_eq!(err.info().unwrap()["arguments"], json!(["predicate"]));
}
