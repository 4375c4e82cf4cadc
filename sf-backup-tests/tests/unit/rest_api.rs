//! Unit tests for REST response parsing and query building

use sf_backup::utils::rest_api::{
    build_soql, parse_describe, parse_object_list, parse_page, FieldDescriptor,
};
use serde_json::json;
use test_utils::describe_body;

#[test]
fn test_describe_keeps_field_order() {
    let fields = parse_describe(&describe_body(&["Id", "Name", "CreatedDate"])).unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();

    assert_eq!(names, vec!["Id", "Name", "CreatedDate"]);
}

#[test]
fn test_describe_rejects_garbage() {
    assert!(parse_describe("<html>Service Unavailable</html>").is_err());
}

#[test]
fn test_soql_with_and_without_order() {
    let fields = vec![FieldDescriptor::new("Id"), FieldDescriptor::new("Name")];

    assert_eq!(
        build_soql("Account", &fields, Some("Id")),
        "SELECT Id, Name FROM Account ORDER BY Id"
    );
    assert_eq!(
        build_soql("AccountShare", &[FieldDescriptor::new("RowCause")], None),
        "SELECT RowCause FROM AccountShare"
    );
}

#[test]
fn test_first_page_with_continuation() {
    let body = json!({
        "totalSize": 150,
        "done": false,
        "nextRecordsUrl": "/services/data/v59.0/query/01gxx-2000",
        "records": [
            {"attributes": {"type": "Contact"}, "Id": "003B", "LastName": "Zed"},
            {"attributes": {"type": "Contact"}, "Id": "003A", "LastName": "Ada"}
        ]
    })
    .to_string();

    let page = parse_page(&body).unwrap();

    assert_eq!(page.total_size, 150);
    assert!(page.has_more());
    assert_eq!(
        page.next_page_token.as_deref(),
        Some("/services/data/v59.0/query/01gxx-2000")
    );
    // Server key order survives parsing
    let keys: Vec<&String> = page.records[0].keys().collect();
    assert_eq!(keys, vec!["attributes", "Id", "LastName"]);
}

#[test]
fn test_empty_result_page() {
    let page = parse_page(r#"{"totalSize": 0, "done": true, "records": []}"#).unwrap();

    assert_eq!(page.total_size, 0);
    assert!(page.records.is_empty());
    assert!(!page.has_more());
}

#[test]
fn test_blank_continuation_is_no_continuation() {
    let page =
        parse_page(r#"{"totalSize": 3, "done": false, "nextRecordsUrl": "", "records": []}"#)
            .unwrap();

    assert_eq!(page.next_page_token, None);
}

#[test]
fn test_object_list_filters_and_sorts() {
    let body = json!({
        "encoding": "UTF-8",
        "sobjects": [
            {"name": "Contact", "queryable": true},
            {"name": "AccountChangeEvent", "queryable": false},
            {"name": "Account", "queryable": true},
            {"name": "Invoice__c", "queryable": true}
        ]
    })
    .to_string();

    assert_eq!(
        parse_object_list(&body).unwrap(),
        vec!["Account", "Contact", "Invoice__c"]
    );
}
