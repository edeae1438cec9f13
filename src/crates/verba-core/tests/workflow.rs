//! End-to-end workflow tests over scripted adapters

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use verba_checkpoint::{CheckpointSaver, FileCheckpointSaver};
use verba_core::testing::{
    score_json, FailingAuditLog, FailingCorrectionStore, ScriptedQualityChecker,
    ScriptedTranslator, TestHarness,
};
use verba_core::{
    AdapterError, AuditLog, Correction, CorrectionStore, DriverOutcome, FileCorrectionStore,
    HumanInput, JsonlAuditLog, Node, RunDriver, RunOutcome, RunStatus, StepSink, WorkflowError,
    WorkflowMachine, WorkflowState,
};

#[tokio::test]
async fn test_hello_french_with_high_accuracy_completes_without_review() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(9, 3, "accurate"),
    );

    let outcome = harness.driver().invoke("Hello", "French").await.unwrap();
    let run = outcome.completed().expect("run should not suspend");

    let qc = run.audit.final_qc.as_ref().unwrap();
    assert_eq!(qc.accuracy_score(), 9);
    assert_eq!(qc.hallucination_score(), 10);
    assert!(qc.is_pass());
    assert!(!run.audit.human_reviewed);

    let entries = harness.audit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].final_translation, "Bonjour");
}

#[tokio::test]
async fn test_suspend_resume_round_trip_records_correction() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour le monde"),
        ScriptedQualityChecker::scores(5, 8, "awkward phrasing"),
    );
    let driver = harness.driver();

    let outcome = driver
        .invoke_with_session("session-1", "Hello world", "French")
        .await
        .unwrap();
    let pending = outcome.pending().expect("failing QC should suspend");
    assert_eq!(pending.reasoning, "awkward phrasing");
    assert_eq!(pending.current_translation, "Bonjour le monde");
    assert!(harness.audit_entries().await.is_empty());

    let run = driver
        .resume("session-1", "Salut le monde")
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(run.audit.final_translation, "Salut le monde");
    assert!(run.audit.human_reviewed);
    assert!(run.audit.final_qc.is_none());
    assert_eq!(run.audit.corrections_used_count, 1);
    assert_eq!(
        harness.corrections.load_all().await,
        vec![Correction::new("Hello world", "Salut le monde")]
    );

    let err = driver.resume("session-1", "again").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NoSuchSession(_)));
    assert_eq!(harness.audit_entries().await.len(), 1);
}

#[tokio::test]
async fn test_resume_errors_leave_run_untouched() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(2, 2, "wrong"),
    );
    let driver = harness.driver();

    let err = driver.resume("unknown", "Salut").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NoSuchSession(ref key) if key == "unknown"));

    driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap();

    let err = driver.resume("s-1", "   ").await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidInput(_)));

    let stored = driver.status("s-1").await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Suspended);
    assert_eq!(stored.state.translated_text(), Some("Bonjour"));
    assert!(harness.corrections.load_all().await.is_empty());
}

#[tokio::test]
async fn test_resume_of_active_run_is_not_suspended() {
    let harness = TestHarness::new(
        ScriptedTranslator::new().fail(AdapterError::Status {
            status: 503,
            body: "overloaded".into(),
        }),
        ScriptedQualityChecker::scores(9, 9, "ok"),
    );
    let driver = harness.driver();

    let err = driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UpstreamTranslation(_)));
    assert!(err.is_retryable());

    let err = driver.resume("s-1", "Salut").await.unwrap_err();
    match err {
        WorkflowError::NotSuspended { session_key, next } => {
            assert_eq!(session_key, "s-1");
            assert_eq!(next, Node::Translate);
        }
        other => panic!("expected NotSuspended, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_start_can_be_retried_under_same_key() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour")
            .fail(AdapterError::Transport("connection reset".into())),
        ScriptedQualityChecker::scores(10, 10, "ok")
            .fail(AdapterError::Transport("timed out".into())),
    );
    let driver = harness.driver();

    let first = driver.invoke_with_session("s-1", "Hello", "French").await;
    assert!(matches!(first, Err(WorkflowError::UpstreamTranslation(_))));

    let second = driver.invoke_with_session("s-1", "Hello", "French").await;
    assert!(matches!(second, Err(WorkflowError::UpstreamQc(_))));
    assert_eq!(driver.status("s-1").await.unwrap().unwrap().next, Node::Qc);

    let third = driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap();
    assert!(!third.is_suspended());
}

#[tokio::test]
async fn test_starting_over_a_parked_session_conflicts() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(1, 1, "no"),
    );
    let driver = harness.driver();
    driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap();

    let err = driver
        .invoke_with_session("s-1", "Goodbye", "French")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SessionConflict { .. }));

    let stored = driver.status("s-1").await.unwrap().unwrap();
    assert_eq!(stored.state.source_text(), "Hello");
}

#[tokio::test]
async fn test_concurrent_resumes_on_one_session_are_serialized() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(3, 3, "poor"),
    );
    let machine = Arc::new(harness.machine());
    let sink = StepSink::none();
    machine
        .start("s-1", WorkflowState::new("Hello", "French"), &sink)
        .await
        .unwrap();

    let a = machine.clone();
    let b = machine.clone();
    let (first, second) = tokio::join!(
        async move { a.resume("s-1", HumanInput::new("Salut"), &StepSink::none()).await },
        async move { b.resume("s-1", HumanInput::new("Coucou"), &StepSink::none()).await },
    );

    let results = [first, second];
    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(RunOutcome::Completed(_))))
        .count();
    assert_eq!(completed, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(WorkflowError::SessionConflict { .. }) | Err(WorkflowError::NoSuchSession(_))
    )));
    assert_eq!(harness.audit_entries().await.len(), 1);
}

#[tokio::test]
async fn test_persistence_failures_become_warnings() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(4, 4, "meh"),
    )
    .with_corrections(Arc::new(FailingCorrectionStore))
    .with_audit(Arc::new(FailingAuditLog));
    let driver = harness.driver();

    let pending = driver.invoke("Hello", "French").await.unwrap().pending().unwrap();
    let run = pending.resume("Salut").await.unwrap().completed().unwrap();

    assert_eq!(run.state.translated_text(), Some("Salut"));
    assert_eq!(run.warnings.len(), 2);
    assert!(run.warnings[0].contains("correction not recorded"));
    assert!(run.warnings[1].contains("audit entry not written"));
}

#[tokio::test]
async fn test_unparseable_qc_output_goes_to_review() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::always("I cannot comply."),
    );

    let pending = harness
        .driver()
        .invoke("Hello", "French")
        .await
        .unwrap()
        .pending()
        .unwrap();
    let qc = pending.qc.as_ref().unwrap();
    assert_eq!((qc.accuracy_score(), qc.hallucination_score()), (1, 1));
    assert_eq!(pending.reasoning, "JSON Parsing Failed");
}

#[tokio::test]
async fn test_fenced_literal_qc_output_is_repaired() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::always(
            "```json\n{'accuracy_score': 7, 'hallucination_score': 9, 'reasoning': 'ok',}\n```",
        ),
    );

    let pending = harness
        .driver()
        .invoke("Hello", "French")
        .await
        .unwrap()
        .pending()
        .unwrap();
    let qc = pending.qc.unwrap();
    assert_eq!((qc.accuracy_score(), qc.hallucination_score()), (7, 9));
    assert!(!qc.is_pass());
}

#[tokio::test]
async fn test_lower_threshold_lets_marginal_translation_pass() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::scores(7, 7, "fine"),
    );
    let driver = RunDriver::new(harness.machine().with_pass_threshold(7));

    let outcome = driver.invoke("Hello", "French").await.unwrap();
    assert!(matches!(outcome, DriverOutcome::Completed(_)));
}

#[tokio::test]
async fn test_corrections_reach_later_runs() {
    let harness = TestHarness::new(
        ScriptedTranslator::always("Bonjour"),
        ScriptedQualityChecker::new()
            .reply(score_json(2, 2, "bad"))
            .reply(score_json(10, 10, "good")),
    );
    let driver = harness.driver();

    let pending = driver.invoke("Hi", "French").await.unwrap().pending().unwrap();
    pending.resume("Salut").await.unwrap();

    let run = driver
        .invoke("Good morning", "French")
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(run.audit.corrections_used_count, 1);

    let requests = harness.translator.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].extra_prompt.is_none());
    assert_eq!(
        requests[1].extra_prompt.as_deref(),
        Some("History:\nSrc: Hi | Fix: Salut")
    );
}

/// Machine over file-backed stores in `dir`, as one CLI process builds it
fn file_backed(dir: &Path) -> WorkflowMachine {
    WorkflowMachine::new(
        Arc::new(ScriptedTranslator::always("Bonjour")),
        Arc::new(ScriptedQualityChecker::scores(3, 9, "tone")),
        Arc::new(FileCorrectionStore::new(dir.join("learned_corrections.json"))),
        Arc::new(JsonlAuditLog::new(dir.join("audit_trail.jsonl"))),
        Arc::new(FileCheckpointSaver::new(dir.join("checkpoints"))),
    )
}

#[tokio::test]
async fn test_parked_run_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    let first = RunDriver::new(file_backed(dir.path()));
    first
        .invoke_with_session("restart-1", "Hello", "French")
        .await
        .unwrap()
        .pending()
        .unwrap();
    drop(first);

    let second = RunDriver::new(file_backed(dir.path()));
    let pending = second.pending_review("restart-1").await.unwrap().unwrap();
    assert_eq!(pending.current_translation, "Bonjour");

    let run = pending.resume("Salut").await.unwrap().completed().unwrap();
    assert_eq!(run.audit.final_translation, "Salut");
    assert!(second.status("restart-1").await.unwrap().is_none());

    let audit = JsonlAuditLog::new(dir.path().join("audit_trail.jsonl"));
    assert_eq!(audit.entries().await.unwrap().len(), 1);
    let store = FileCorrectionStore::new(dir.path().join("learned_corrections.json"));
    assert_eq!(store.load_all().await, vec![Correction::new("Hello", "Salut")]);
}

#[tokio::test]
async fn test_resumes_from_separate_machines_complete_once() {
    let dir = TempDir::new().unwrap();
    let first = RunDriver::new(file_backed(dir.path()));
    let second = RunDriver::new(file_backed(dir.path()));

    first
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap()
        .pending()
        .unwrap();

    let (a, b) = tokio::join!(first.resume("s-1", "Salut"), second.resume("s-1", "Coucou"));
    let results = [a, b];
    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok(DriverOutcome::Completed(_))))
        .count();
    assert_eq!(completed, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(WorkflowError::SessionConflict { .. }) | Err(WorkflowError::NoSuchSession(_))
    )));

    let audit = JsonlAuditLog::new(dir.path().join("audit_trail.jsonl"));
    assert_eq!(audit.entries().await.unwrap().len(), 1);
    let store = FileCorrectionStore::new(dir.path().join("learned_corrections.json"));
    assert_eq!(store.load_all().await.len(), 1);
}

#[tokio::test]
async fn test_claim_held_elsewhere_blocks_resume() {
    let dir = TempDir::new().unwrap();
    let driver = RunDriver::new(file_backed(dir.path()));
    driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap()
        .pending()
        .unwrap();

    let other = FileCheckpointSaver::new(dir.path().join("checkpoints"));
    let claim = other.claim_thread("s-1").await.unwrap().unwrap();

    let err = driver.resume("s-1", "Salut").await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionConflict { .. }), "{:?}", err);
    let err = driver
        .invoke_with_session("s-1", "Hello", "French")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SessionConflict { .. }), "{:?}", err);

    let stored = driver.status("s-1").await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Suspended);

    drop(claim);
    let run = driver.resume("s-1", "Salut").await.unwrap().completed().unwrap();
    assert_eq!(run.audit.final_translation, "Salut");
}
