//! Unit tests for the paginated fetcher

use sf_backup::managers::fetcher::fetch_all;
use sf_backup::utils::CancelSignal;
use test_utils::{
    page_token, sample_records, single_page, MockRecordSource, PageResult, SourceCall, SourceError,
};

#[test]
fn test_single_page_needs_no_continuation() {
    let source = MockRecordSource::new().with_pages(
        "Account",
        &["Id", "Name"],
        vec![single_page(sample_records("Account", 7))],
    );

    let outcome = fetch_all(&source, "Account", &CancelSignal::new(), |_, _| {}).unwrap();

    assert_eq!(outcome.records.len(), 7);
    assert_eq!(source.query_more_count(), 0);
}

#[test]
fn test_follows_each_token_once() {
    let source = MockRecordSource::new().with_object(
        "Contact",
        &["Id"],
        sample_records("Contact", 5),
        2,
    );

    fetch_all(&source, "Contact", &CancelSignal::new(), |_, _| {}).unwrap();

    let tokens: Vec<String> = source
        .get_calls()
        .into_iter()
        .filter_map(|c| match c {
            SourceCall::QueryMore { token } => Some(token),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec![page_token("Contact", 1), page_token("Contact", 2)]);
}

#[test]
fn test_describe_precedes_query() {
    let source = MockRecordSource::new().with_empty_object("Case", &["Id", "Subject"]);

    fetch_all(&source, "Case", &CancelSignal::new(), |_, _| {}).unwrap();

    assert_eq!(
        source.get_calls(),
        vec![
            SourceCall::Describe { object: "Case".to_string() },
            SourceCall::QueryAll {
                object: "Case".to_string(),
                order_by: Some("Id".to_string()),
            },
        ]
    );
}

#[test]
fn test_zero_total_ignores_stray_records() {
    let source = MockRecordSource::new().with_pages(
        "Task",
        &["Id"],
        vec![PageResult {
            records: sample_records("Task", 1),
            total_size: 0,
            done: true,
            next_page_token: None,
        }],
    );

    let outcome = fetch_all(&source, "Task", &CancelSignal::new(), |_, _| {}).unwrap();

    assert!(outcome.is_empty());
    assert!(outcome.records.is_empty());
}

#[test]
fn test_cancel_before_start_still_returns_first_page() {
    let cancel = CancelSignal::new();
    cancel.cancel();
    let source = MockRecordSource::new().with_object(
        "Contact",
        &["Id"],
        sample_records("Contact", 30),
        10,
    );

    let outcome = fetch_all(&source, "Contact", &cancel, |_, _| {}).unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.records.len(), 10);
}

#[test]
fn test_query_failure_is_query_error() {
    let source = MockRecordSource::new()
        .with_empty_object("Opportunity", &["Id"])
        .with_failing_query("Opportunity");

    let result = fetch_all(&source, "Opportunity", &CancelSignal::new(), |_, _| {});

    assert!(matches!(result, Err(SourceError::Query { object, .. }) if object == "Opportunity"));
}
