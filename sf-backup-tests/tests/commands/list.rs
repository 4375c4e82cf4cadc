//! Tests for the 'list' command

use sf_backup::utils::source_ops::filter_objects;
use test_utils::{MockRecordSource, RecordSource, SourceCall, SourceError};

fn source() -> MockRecordSource {
    MockRecordSource::new()
        .with_empty_object("Contact", &["Id"])
        .with_empty_object("Account", &["Id"])
        .with_empty_object("AccountContactRelation", &["Id"])
        .with_empty_object("Invoice__c", &["Id"])
}

#[test]
fn test_list_is_sorted() {
    let source = source();

    let listed = source.list_objects().unwrap();

    assert_eq!(
        listed,
        vec!["Account", "AccountContactRelation", "Contact", "Invoice__c"]
    );
    assert_eq!(source.get_calls(), vec![SourceCall::ListObjects]);
}

#[test]
fn test_filter_is_case_insensitive() {
    let listed = source().list_objects().unwrap();

    assert_eq!(
        filter_objects(&listed, "CONTACT"),
        vec!["AccountContactRelation", "Contact"]
    );
    assert_eq!(filter_objects(&listed, "__c"), vec!["Invoice__c"]);
    assert_eq!(filter_objects(&listed, ""), listed);
}

#[test]
fn test_listing_failure() {
    let source = source().with_failing_listing();

    assert!(matches!(source.list_objects(), Err(SourceError::Listing { .. })));
}
