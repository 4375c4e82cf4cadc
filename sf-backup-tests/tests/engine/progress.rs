//! Status published while a run is in progress

use super::Gate;
use sf_backup::{BackupEngine, RunState};
use std::sync::Arc;
use test_utils::{names, sample_records, MockRecordSource, TestContext};

#[test]
fn test_idle_before_first_run() {
    let engine = BackupEngine::new(Arc::new(MockRecordSource::new()));
    let progress = engine.progress();

    assert_eq!(progress.state, RunState::Idle);
    assert_eq!(progress.total, 0);
    assert_eq!(progress.current_object, None);
}

#[test]
fn test_progress_names_current_object() {
    let ctx = TestContext::new();
    let (gate, hook) = Gate::new();
    let source = MockRecordSource::new()
        .with_object("Account", &["Id"], sample_records("Account", 2), 10)
        .with_object("Contact", &["Id"], sample_records("Contact", 2), 10)
        .with_query_hook("Contact", hook)
        .with_empty_object("Lead", &["Id"]);
    let engine = BackupEngine::new(Arc::new(source));

    let handle = engine
        .start_backup(&names(&["Account", "Contact", "Lead"]), &ctx.output_root())
        .unwrap();
    gate.wait_arrived();

    let progress = handle.progress();
    assert_eq!(progress.state, RunState::Running);
    assert_eq!(progress.current_index, 2);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.current_object.as_deref(), Some("Contact"));
    assert_eq!(progress.finished, 1);
    assert_eq!(progress.records_retrieved, 0);
    assert_eq!(progress.to_string(), "Backing up Contact (2/3)");
    assert_eq!(engine.state(), RunState::Running);

    gate.release();
    handle.wait();
}

#[test]
fn test_final_snapshot_after_run() {
    let ctx = TestContext::new();
    let source = MockRecordSource::new()
        .with_object("Contact", &["Id"], sample_records("Contact", 150), 100);
    let engine = BackupEngine::new(Arc::new(source));
    let mut rx = engine.subscribe();

    engine
        .run_to_completion(&names(&["Contact"]), &ctx.output_root())
        .unwrap();

    assert!(rx.has_changed().unwrap());
    let progress = rx.borrow_and_update().clone();
    assert_eq!(progress.state, RunState::Completed);
    assert_eq!(progress.finished, 1);
    assert_eq!(progress.current_object, None);
    assert_eq!(progress.records_retrieved, 150);
    assert_eq!(progress.records_expected, 150);
    assert_eq!(progress.percent(), 100.0);
    assert_eq!(progress.to_string(), "Backup completed (1/1 objects)");
}

#[test]
fn test_cancelled_state_is_published() {
    let ctx = TestContext::new();
    let (gate, hook) = Gate::new();
    let source = MockRecordSource::new()
        .with_object("Account", &["Id"], sample_records("Account", 1), 10)
        .with_query_hook("Account", hook)
        .with_empty_object("Lead", &["Id"]);
    let engine = BackupEngine::new(Arc::new(source));

    let handle = engine
        .start_backup(&names(&["Account", "Lead"]), &ctx.output_root())
        .unwrap();
    gate.wait_arrived();
    handle.cancel();
    gate.release();
    let report = handle.wait();

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(engine.state(), RunState::Cancelled);
    assert_eq!(engine.progress().finished, 2);
}
