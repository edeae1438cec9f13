//! Workflow state machine
//!
//! The machine is a transition function over a serializable [`RunCheckpoint`].
//! After every node it persists the checkpoint, then reports a [`StepEvent`],
//! so a process restart at any point loses at most the node in flight.
//!
//! # Suspend / resume
//!
//! When `qc` fails the run is parked at `human_review`: the checkpoint is
//! stored with status `suspended` and control returns to the caller with a
//! [`Suspension`]. Nothing is held in memory while parked. [`WorkflowMachine::resume`]
//! loads the checkpoint, injects the reviewer's text, records the correction
//! and continues from `save_result`.
//!
//! # Failure
//!
//! Adapter failures abort the run and leave the checkpoint at the failing
//! node. Correction store and audit log failures are reported as warnings on
//! the completed run and never roll back state.

use crate::adapters::{QcRequest, QualityChecker, TranslationRequest, Translator};
use crate::audit::{AuditEntry, AuditLog};
use crate::config::{EngineConfig, DEFAULT_PASS_THRESHOLD};
use crate::error::{Result, WorkflowError};
use crate::graph::Node;
use crate::interrupt::{HumanInput, Suspension};
use crate::repair::parse_qc_output;
use crate::state::WorkflowState;
use crate::store::CorrectionStore;
use crate::stream::{StepEvent, StepSink};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tooling::logging::{log_step, timed};
use tracing::{debug, error, info, warn};
use verba_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
    ThreadClaim,
};

/// Lifecycle of a stored run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
}

/// Everything needed to continue a run, stored under its session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub session_key: String,
    pub state: WorkflowState,
    /// Node to execute next
    pub next: Node,
    pub status: RunStatus,
    /// Number of nodes completed
    pub step: u32,
    pub human_reviewed: bool,
}

/// A run that reached `save_result`
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub session_key: String,
    pub state: WorkflowState,
    pub audit: AuditEntry,
    /// Persistence failures that did not stop the run
    pub warnings: Vec<String>,
}

/// How a `start` or `resume` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(CompletedRun),
    Suspended(Suspension),
}

impl RunOutcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended(_))
    }

    pub fn session_key(&self) -> &str {
        match self {
            RunOutcome::Completed(run) => &run.session_key,
            RunOutcome::Suspended(suspension) => &suspension.session_key,
        }
    }
}

/// Translation workflow with injected adapters and stores
pub struct WorkflowMachine {
    translator: Arc<dyn Translator>,
    quality: Arc<dyn QualityChecker>,
    corrections: Arc<dyn CorrectionStore>,
    audit: Arc<dyn AuditLog>,
    checkpointer: Arc<dyn CheckpointSaver>,
    pass_threshold: u8,
    keep_completed: bool,
}

impl std::fmt::Debug for WorkflowMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowMachine")
            .field("pass_threshold", &self.pass_threshold)
            .field("keep_completed", &self.keep_completed)
            .finish_non_exhaustive()
    }
}

impl WorkflowMachine {
    pub fn new(
        translator: Arc<dyn Translator>,
        quality: Arc<dyn QualityChecker>,
        corrections: Arc<dyn CorrectionStore>,
        audit: Arc<dyn AuditLog>,
        checkpointer: Arc<dyn CheckpointSaver>,
    ) -> Self {
        Self {
            translator,
            quality,
            corrections,
            audit,
            checkpointer,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            keep_completed: false,
        }
    }

    pub fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// Keep terminal checkpoints instead of deleting them
    pub fn with_keep_completed(mut self, keep: bool) -> Self {
        self.keep_completed = keep;
        self
    }

    pub fn with_config(self, config: &EngineConfig) -> Self {
        self.with_pass_threshold(config.pass_threshold)
            .with_keep_completed(config.keep_completed)
    }

    pub fn pass_threshold(&self) -> u8 {
        self.pass_threshold
    }

    pub fn corrections(&self) -> &Arc<dyn CorrectionStore> {
        &self.corrections
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// Begin a new run under `session_key`
    ///
    /// A stored run that is parked for review is never replaced; a stale
    /// running or completed checkpoint is.
    pub async fn start(
        &self,
        session_key: &str,
        initial: WorkflowState,
        sink: &StepSink,
    ) -> Result<RunOutcome> {
        if session_key.trim().is_empty() {
            return Err(WorkflowError::invalid_input("session key must not be empty"));
        }
        if initial.source_text().trim().is_empty() {
            return Err(WorkflowError::invalid_input("source_text must not be empty"));
        }
        if initial.target_language().trim().is_empty() {
            return Err(WorkflowError::invalid_input("target_language must not be empty"));
        }

        let _claim = self.claim(session_key).await?;

        if let Some(existing) = self.load(session_key).await? {
            if existing.status == RunStatus::Suspended {
                return Err(WorkflowError::session_conflict(
                    session_key,
                    "run is suspended awaiting human review",
                ));
            }
            debug!(session = %session_key, status = ?existing.status, "Replacing stale checkpoint");
        }

        let run = RunCheckpoint {
            session_key: session_key.to_string(),
            state: initial,
            next: Node::Translate,
            status: RunStatus::Running,
            step: 0,
            human_reviewed: false,
        };
        self.persist(&run, CheckpointSource::Input, None).await?;
        info!(
            session = %session_key,
            target_language = %run.state.target_language(),
            history = run.state.correction_history().len(),
            "Run started"
        );

        self.drive(run, sink, Vec::new()).await
    }

    /// Continue a run parked at `human_review` with the reviewer's text
    pub async fn resume(
        &self,
        session_key: &str,
        input: HumanInput,
        sink: &StepSink,
    ) -> Result<RunOutcome> {
        if input.corrected_text.trim().is_empty() {
            return Err(WorkflowError::invalid_input("corrected text must not be empty"));
        }

        let _claim = self.claim(session_key).await?;

        let mut run = match self.load(session_key).await? {
            Some(run) if run.status != RunStatus::Completed => run,
            _ => return Err(WorkflowError::NoSuchSession(session_key.to_string())),
        };
        if run.status != RunStatus::Suspended || run.next != Node::HumanReview {
            return Err(WorkflowError::NotSuspended {
                session_key: session_key.to_string(),
                next: run.next,
            });
        }

        let mut warnings = Vec::new();
        let source = run.state.source_text().to_string();
        run.state.set_translation(input.corrected_text.clone());

        match self.corrections.record(&source, &input.corrected_text).await {
            Ok(true) => info!(session = %session_key, "Correction recorded"),
            Ok(false) => debug!(session = %session_key, "Correction for this source already known"),
            Err(e) => {
                warn!(session = %session_key, error = %e, "Failed to record correction");
                warnings.push(format!("correction not recorded: {}", e));
            }
        }
        let history = self.corrections.load_all().await;
        run.state.replace_history(history);

        run.human_reviewed = true;
        run.status = RunStatus::Running;

        let mut produced = Map::new();
        produced.insert(
            "translated_text".to_string(),
            Value::String(input.corrected_text),
        );
        produced.insert(
            "correction_history".to_string(),
            serde_json::to_value(run.state.correction_history())?,
        );
        self.complete_node(&mut run, Node::HumanReview, produced, CheckpointSource::Resume, sink)
            .await?;

        self.drive(run, sink, warnings).await
    }

    /// Stored run for `session_key`, if any
    pub async fn checkpoint(&self, session_key: &str) -> Result<Option<RunCheckpoint>> {
        self.load(session_key).await
    }

    async fn drive(
        &self,
        mut run: RunCheckpoint,
        sink: &StepSink,
        mut warnings: Vec<String>,
    ) -> Result<RunOutcome> {
        loop {
            let node = run.next;
            debug!(session = %run.session_key, node = %node, "Entering node");

            match node {
                Node::Translate => {
                    let produced = self.translate(&mut run).await?;
                    self.complete_node(&mut run, node, produced, CheckpointSource::Loop, sink)
                        .await?;
                }
                Node::Qc => {
                    let produced = self.quality_check(&mut run).await?;
                    self.complete_node(&mut run, node, produced, CheckpointSource::Loop, sink)
                        .await?;
                }
                Node::HumanReview => return self.suspend(&mut run).await,
                Node::SaveResult => {
                    let completed = self.save_result(&mut run, sink, &mut warnings).await?;
                    return Ok(RunOutcome::Completed(CompletedRun {
                        warnings,
                        ..completed
                    }));
                }
                Node::End => {
                    return Err(WorkflowError::Internal(format!(
                        "session '{}' has no node left to run",
                        run.session_key
                    )))
                }
            }
        }
    }

    async fn translate(&self, run: &mut RunCheckpoint) -> Result<Map<String, Value>> {
        let request = TranslationRequest {
            text: run.state.source_text().to_string(),
            target_language: run.state.target_language().to_string(),
            extra_prompt: run.state.few_shot_hint(),
        };

        let response = timed("translate", self.translator.translate(&request))
            .await
            .map_err(|e| {
                error!(session = %run.session_key, error = %e, "Translation failed");
                WorkflowError::UpstreamTranslation(e)
            })?;

        run.state.set_translation(response.translated_text.clone());

        let mut produced = Map::new();
        produced.insert(
            "translated_text".to_string(),
            Value::String(response.translated_text),
        );
        Ok(produced)
    }

    async fn quality_check(&self, run: &mut RunCheckpoint) -> Result<Map<String, Value>> {
        let request = QcRequest {
            source_text: run.state.source_text().to_string(),
            translated_text: run.state.translated_text().unwrap_or_default().to_string(),
        };

        let raw = timed("qc", self.quality.check(&request))
            .await
            .map_err(|e| {
                error!(session = %run.session_key, error = %e, "Quality check failed");
                WorkflowError::UpstreamQc(e)
            })?;

        let qc = parse_qc_output(&raw, self.pass_threshold);
        info!(
            session = %run.session_key,
            accuracy = qc.accuracy_score(),
            hallucination = qc.hallucination_score(),
            pass = qc.is_pass(),
            "Quality check scored"
        );

        let mut produced = Map::new();
        produced.insert("qc_result".to_string(), serde_json::to_value(&qc)?);
        run.state.set_qc_result(qc);
        Ok(produced)
    }

    async fn suspend(&self, run: &mut RunCheckpoint) -> Result<RunOutcome> {
        run.status = RunStatus::Suspended;
        self.persist(run, CheckpointSource::Loop, Some(Node::HumanReview))
            .await?;

        let qc = run.state.qc_result().cloned();
        let reasoning = qc
            .as_ref()
            .map(|qc| qc.reasoning().to_string())
            .unwrap_or_default();
        warn!(
            session = %run.session_key,
            reasoning = %reasoning,
            "Quality check failed, waiting for human review"
        );

        Ok(RunOutcome::Suspended(Suspension {
            session_key: run.session_key.clone(),
            node: Node::HumanReview,
            reasoning,
            current_translation: run.state.translated_text().unwrap_or_default().to_string(),
            qc,
        }))
    }

    async fn save_result(
        &self,
        run: &mut RunCheckpoint,
        sink: &StepSink,
        warnings: &mut Vec<String>,
    ) -> Result<CompletedRun> {
        let entry = AuditEntry {
            session_key: run.session_key.clone(),
            source_text: run.state.source_text().to_string(),
            target_language: run.state.target_language().to_string(),
            final_translation: run.state.translated_text().unwrap_or_default().to_string(),
            final_qc: run.state.qc_result().cloned(),
            corrections_used_count: run.state.correction_history().len(),
            human_reviewed: run.human_reviewed,
            completed_at: Utc::now(),
        };

        if let Err(e) = self.audit.append(&entry).await {
            warn!(session = %run.session_key, error = %e, "Failed to append audit entry");
            warnings.push(format!("audit entry not written: {}", e));
        }

        let mut produced = Map::new();
        produced.insert(
            "final_translation".to_string(),
            Value::String(entry.final_translation.clone()),
        );
        run.status = RunStatus::Completed;
        self.complete_node(run, Node::SaveResult, produced, CheckpointSource::Loop, sink)
            .await?;

        if !self.keep_completed {
            if let Err(e) = self.checkpointer.delete_thread(&run.session_key).await {
                warn!(session = %run.session_key, error = %e, "Failed to discard finished checkpoint");
                warnings.push(format!("checkpoint not discarded: {}", e));
            }
        }

        info!(
            session = %run.session_key,
            steps = run.step,
            human_reviewed = run.human_reviewed,
            "Run completed"
        );

        Ok(CompletedRun {
            session_key: run.session_key.clone(),
            state: run.state.clone(),
            audit: entry,
            warnings: Vec::new(),
        })
    }

    /// Advance past `node`, persist, then notify
    async fn complete_node(
        &self,
        run: &mut RunCheckpoint,
        node: Node,
        produced: Map<String, Value>,
        source: CheckpointSource,
        sink: &StepSink,
    ) -> Result<()> {
        run.step += 1;
        run.next = node.successor(&run.state);
        self.persist(run, source, Some(node)).await?;

        let snapshot = serde_json::to_value(&run.state).unwrap_or(Value::Null);
        log_step(node.name(), &snapshot, &format!("{} completed", node));

        sink.emit(StepEvent {
            session_key: run.session_key.clone(),
            node,
            step: run.step,
            produced,
        });
        Ok(())
    }

    /// Exclusive hold on the session for the rest of a `start`/`resume` call
    ///
    /// The claim lives in the checkpoint saver, so it excludes every machine
    /// sharing the same storage, not just this one.
    async fn claim(&self, session_key: &str) -> Result<ThreadClaim> {
        self.checkpointer
            .claim_thread(session_key)
            .await?
            .ok_or_else(|| {
                WorkflowError::session_conflict(session_key, "another start or resume is in progress")
            })
    }

    async fn load(&self, session_key: &str) -> Result<Option<RunCheckpoint>> {
        let config = CheckpointConfig::for_thread(session_key);
        match self.checkpointer.get(&config).await? {
            Some(checkpoint) => Ok(Some(serde_json::from_value(checkpoint.values)?)),
            None => Ok(None),
        }
    }

    async fn persist(
        &self,
        run: &RunCheckpoint,
        source: CheckpointSource,
        node: Option<Node>,
    ) -> Result<()> {
        let mut metadata = CheckpointMetadata::new()
            .with_source(source)
            .with_step(i32::try_from(run.step).unwrap_or(i32::MAX));
        if let Some(node) = node {
            metadata = metadata.with_node(node.name());
        }

        let checkpoint = Checkpoint::new(serde_json::to_value(run)?);
        self.checkpointer
            .put(&CheckpointConfig::for_thread(&run.session_key), checkpoint, metadata)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedQualityChecker, ScriptedTranslator, TestHarness};
    use futures::StreamExt;

    fn harness(qc_raw: &str) -> TestHarness {
        TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::always(qc_raw),
        )
    }

    #[tokio::test]
    async fn test_passing_run_emits_steps_in_order() {
        let h = harness(r#"{"accuracy_score": 9, "hallucination_score": 3, "reasoning": "ok"}"#);
        let machine = h.machine();
        let (sink, mut rx) = StepSink::channel();

        let outcome = machine
            .start("s-1", WorkflowState::new("Hello", "French"), &sink)
            .await
            .unwrap();
        drop(sink);

        let RunOutcome::Completed(run) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(run.audit.final_translation, "Bonjour");
        assert!(run.warnings.is_empty());

        let mut nodes = Vec::new();
        while let Some(event) = rx.recv().await {
            nodes.push((event.node, event.step));
        }
        assert_eq!(
            nodes,
            vec![(Node::Translate, 1), (Node::Qc, 2), (Node::SaveResult, 3)]
        );
    }

    #[tokio::test]
    async fn test_failing_qc_parks_checkpoint() {
        let h = harness(r#"{"accuracy_score": 4, "hallucination_score": 9, "reasoning": "meaning lost"}"#);
        let machine = h.machine();

        let outcome = machine
            .start("s-1", WorkflowState::new("Hello", "French"), &StepSink::none())
            .await
            .unwrap();
        let RunOutcome::Suspended(suspension) = outcome else {
            panic!("expected suspension");
        };
        assert_eq!(suspension.reasoning, "meaning lost");
        assert_eq!(suspension.current_translation, "Bonjour");

        let stored = machine.checkpoint("s-1").await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Suspended);
        assert_eq!(stored.next, Node::HumanReview);
        assert_eq!(stored.step, 2);
        assert!(h.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_validates_input() {
        let machine = harness("{}").machine();
        let sink = StepSink::none();

        for (key, source, lang) in [(" ", "Hello", "French"), ("s", "  ", "French"), ("s", "Hello", "")] {
            let err = machine
                .start(key, WorkflowState::new(source, lang), &sink)
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidInput(_)), "{:?}", err);
        }
        assert!(machine.checkpoint("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_translation_failure_leaves_checkpoint_at_translate() {
        let h = TestHarness::new(
            ScriptedTranslator::new().fail(crate::AdapterError::Transport("refused".into())),
            ScriptedQualityChecker::always("{}"),
        );
        let machine = h.machine();

        let err = machine
            .start("s-1", WorkflowState::new("Hello", "French"), &StepSink::none())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UpstreamTranslation(_)));

        let stored = machine.checkpoint("s-1").await.unwrap().unwrap();
        assert_eq!(stored.next, Node::Translate);
        assert_eq!(stored.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_keep_completed_retains_terminal_checkpoint() {
        let h = harness(r#"{"accuracy_score": 10, "hallucination_score": 10, "reasoning": "ok"}"#);
        let machine = h.machine().with_keep_completed(true);

        machine
            .start("s-1", WorkflowState::new("Hello", "French"), &StepSink::none())
            .await
            .unwrap();

        let stored = machine.checkpoint("s-1").await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.next, Node::End);

        let history: Vec<_> = h
            .checkpointer
            .list(Some(&CheckpointConfig::for_thread("s-1")), None)
            .await
            .unwrap()
            .collect()
            .await;
        // input + translate + qc + save_result
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_resume_of_completed_run_is_no_such_session() {
        let h = harness(r#"{"accuracy_score": 10, "hallucination_score": 10, "reasoning": "ok"}"#);
        let machine = h.machine().with_keep_completed(true);
        machine
            .start("s-1", WorkflowState::new("Hello", "French"), &StepSink::none())
            .await
            .unwrap();

        let err = machine
            .resume("s-1", HumanInput::new("Salut"), &StepSink::none())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NoSuchSession(_)));
    }
}
