//! Complete runs: ordering, outcomes and files on disk

use super::Gate;
use sf_backup::managers::backup::RUN_DIR_FORMAT;
use sf_backup::{BackupEngine, BackupError, ObjectStatus, RunHandle, RunState};
use std::sync::Arc;
use std::thread;
use test_utils::{names, read_csv, sample_records, MockRecordSource, TestContext};

#[test]
fn test_empty_then_paginated_object() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_empty_object("Account", &["Id", "Name"])
        .with_object("Contact", &["Id", "Name"], sample_records("Contact", 150), 100);
    let engine = BackupEngine::new(Arc::new(source.clone()));

    let report = engine
        .run_to_completion(&names(&["Account", "Contact"]), &ctx.output_root())
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    let account = report.result("Account").unwrap();
    assert_eq!(account.status, ObjectStatus::Empty);
    assert_eq!(account.record_count, 0);
    assert!(account.file.is_none());

    let contact = report.result("Contact").unwrap();
    assert_eq!(contact.status, ObjectStatus::Success);
    assert_eq!(contact.record_count, 150);

    let (header, rows) = read_csv(contact.file.as_ref().unwrap()).unwrap();
    assert_eq!(header, vec!["Id", "Name"]);
    assert_eq!(rows.len(), 150);
    assert_eq!(rows[149][1], "Contact 149");
    assert!(!report.run_dir.join("Account.csv").exists());
}

#[test]
fn test_run_dir_is_timestamped_under_output_root() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new().with_object("Lead", &["Id"], sample_records("Lead", 1), 10);
    let engine = BackupEngine::new(Arc::new(source));

    let report = engine
        .run_to_completion(&names(&["Lead"]), &ctx.output_root())
        .unwrap();

    assert_eq!(report.run_dir.parent().unwrap(), ctx.output_root());
    let dir_name = report.run_dir.file_name().unwrap().to_string_lossy().to_string();
    let stamp = dir_name.split('_').take(2).collect::<Vec<_>>().join("_");
    assert!(chrono::NaiveDateTime::parse_from_str(&stamp, RUN_DIR_FORMAT).is_ok());
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn test_results_follow_selection_order() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_object("Opportunity", &["Id"], sample_records("Opportunity", 3), 2)
        .with_empty_object("Lead", &["Id"])
        .with_object("Account", &["Id"], sample_records("Account", 1), 2);
    let engine = BackupEngine::new(Arc::new(source));

    let report = engine
        .run_to_completion(&names(&["Opportunity", "Lead", "Account"]), &ctx.output_root())
        .unwrap();

    let order: Vec<&str> = report.results.iter().map(|r| r.object.as_str()).collect();
    assert_eq!(order, vec!["Opportunity", "Lead", "Account"]);
    assert_eq!(report.records_written(), 4);
}

#[test]
fn test_each_failure_kind_is_isolated() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_object("Account", &["Id"], sample_records("Account", 2), 10)
        .with_object("Contact", &["Id"], sample_records("Contact", 20), 10)
        .with_failing_page("Contact", 1)
        .with_empty_object("Case", &["Id"])
        .with_failing_query("Case")
        .with_object("Lead", &["Id"], sample_records("Lead", 2), 10);
    let engine = BackupEngine::new(Arc::new(source));

    let report = engine
        .run_to_completion(
            &names(&["Account", "Contact", "Missing__c", "Case", "Lead"]),
            &ctx.output_root(),
        )
        .unwrap();

    let statuses: Vec<ObjectStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ObjectStatus::Success,
            ObjectStatus::Failed,
            ObjectStatus::Failed,
            ObjectStatus::Failed,
            ObjectStatus::Success,
        ]
    );
    assert_eq!(report.state, RunState::Completed);

    for failed in report.results.iter().filter(|r| r.status == ObjectStatus::Failed) {
        assert!(failed.error.is_some());
        assert_eq!(failed.record_count, 0);
        assert!(!report.run_dir.join(format!("{}.csv", failed.object)).exists());
    }
    assert!(report.run_dir.join("Lead.csv").exists());
}

#[test]
fn test_panic_in_source_is_contained() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_object("Account", &["Id"], sample_records("Account", 1), 10)
        .with_query_hook("Account", || panic!("connection reset"))
        .with_object("Contact", &["Id"], sample_records("Contact", 1), 10);
    let engine = BackupEngine::new(Arc::new(source));

    let report = engine
        .run_to_completion(&names(&["Account", "Contact"]), &ctx.output_root())
        .unwrap();

    let account = report.result("Account").unwrap();
    assert_eq!(account.status, ObjectStatus::Failed);
    assert!(account.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(report.result("Contact").unwrap().status, ObjectStatus::Success);
    assert!(!engine.is_running());
}

#[test]
fn test_write_failure_keeps_fetched_count() {
    let ctx = TestContext::new();
    let (gate, hook) = Gate::new();
    let source = MockRecordSource::new()
        .with_empty_object("Account", &["Id"])
        .with_object("Contact", &["Id"], sample_records("Contact", 4), 10)
        .with_query_hook("Contact", hook);
    let engine = BackupEngine::new(Arc::new(source));

    let handle = engine
        .start_backup(&names(&["Account", "Contact"]), &ctx.output_root())
        .unwrap();
    gate.wait_arrived();
    // A directory where the CSV file should go makes the write fail
    std::fs::create_dir(handle.run_dir().join("Contact.csv")).unwrap();
    gate.release();
    let report = handle.wait();

    assert_eq!(report.result("Account").unwrap().status, ObjectStatus::Empty);
    let contact = report.result("Contact").unwrap();
    assert_eq!(contact.status, ObjectStatus::Failed);
    assert_eq!(contact.record_count, 4);
    assert!(contact.error.as_deref().unwrap().contains("Failed to write"));
}

#[test]
fn test_unusable_output_root_is_refused() {
    let ctx = TestContext::new();
    let blocker = ctx.create_file("not-a-dir", "file");
    let engine = BackupEngine::new(Arc::new(MockRecordSource::new()));

    let result = engine.start_backup(&names(&["Account"]), &blocker);

    assert!(matches!(result, Err(BackupError::RunDir { .. })));
    assert!(!engine.is_running());
}

#[test]
fn test_back_to_back_runs_keep_separate_directories() {
    let ctx = TestContext::new();
    let first_engine = BackupEngine::new(Arc::new(
        MockRecordSource::new().with_object("Lead", &["Id"], sample_records("Lead", 5), 10),
    ));
    let second_engine = BackupEngine::new(Arc::new(
        MockRecordSource::new().with_object("Lead", &["Id"], sample_records("Lead", 1), 10),
    ));

    let first = first_engine
        .run_to_completion(&names(&["Lead"]), &ctx.output_root())
        .unwrap();
    let second = second_engine
        .run_to_completion(&names(&["Lead"]), &ctx.output_root())
        .unwrap();

    assert_ne!(first.run_dir, second.run_dir);
    let (_, first_rows) = read_csv(&first.run_dir.join("Lead.csv")).unwrap();
    let (_, second_rows) = read_csv(&second.run_dir.join("Lead.csv")).unwrap();
    assert_eq!(first_rows.len(), 5);
    assert_eq!(second_rows.len(), 1);
}

#[test]
fn test_new_run_accepted_once_terminal_state_is_visible() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new().with_empty_object("Lead", &["Id"]);
    let engine = BackupEngine::new(Arc::new(source));
    let rx = engine.subscribe();

    let mut previous: Option<RunHandle> = None;
    for _ in 0..200 {
        let handle = engine
            .start_backup(&names(&["Lead"]), &ctx.output_root())
            .unwrap();
        if let Some(done) = previous.take() {
            done.wait();
        }
        while !rx.borrow().state.is_terminal() {
            thread::yield_now();
        }
        previous = Some(handle);
    }

    let last = previous.unwrap().wait();
    assert_eq!(last.state, RunState::Completed);
}

#[test]
fn test_duplicate_entries_back_up_once() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_object("Account", &["Id"], sample_records("Account", 1), 10);
    let engine = BackupEngine::new(Arc::new(source.clone()));

    let report = engine
        .run_to_completion(&names(&["Account", "Account"]), &ctx.output_root())
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(
        source.get_calls().iter().filter(|c| matches!(c, test_utils::SourceCall::Describe { .. })).count(),
        1
    );
}

#[test]
fn test_engine_accepts_new_run_after_wait() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new().with_object("Lead", &["Id"], sample_records("Lead", 2), 10);
    let engine = BackupEngine::new(Arc::new(source));

    assert!(engine.last_report().is_none());
    let first = engine
        .run_to_completion(&names(&["Lead"]), &ctx.create_subdir("first"))
        .unwrap();
    let second = engine
        .run_to_completion(&names(&["Lead"]), &ctx.create_subdir("second"))
        .unwrap();

    assert_eq!(first.state, RunState::Completed);
    assert_eq!(engine.last_report().unwrap().run_dir, second.run_dir);
}

#[test]
fn test_empty_selection_is_refused() {
    let ctx = TestContext::new();
    let engine = BackupEngine::new(Arc::new(MockRecordSource::new()));

    let result = engine.start_backup(&[], &ctx.output_root());

    assert!(matches!(result, Err(BackupError::NoSelection)));
    assert!(!ctx.output_root().exists());
    assert!(engine.last_report().is_none());
}
