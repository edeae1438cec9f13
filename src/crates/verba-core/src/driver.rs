//! Run driver
//!
//! Public entry point over a [`WorkflowMachine`]. It seeds new runs with the
//! stored correction history and turns suspensions into [`PendingReview`]
//! continuations bound to the session key.
//!
//! Two shapes are offered:
//!
//! - [`RunDriver::invoke`] / [`RunDriver::resume`] wait for the outcome.
//! - [`RunDriver::run`] / [`RunDriver::resume_stream`] return a stream of
//!   [`RunEvent::Step`] items terminated by exactly one `Completed` or
//!   `Suspended` event, or an error item.
//!
//! ```text
//!   run("Hello", "French")
//!     ├─ Step(translate)
//!     ├─ Step(qc)
//!     └─ Suspended(PendingReview) ── resume("Salut") ──▶ Step(human_review)
//!                                                        Step(save_result)
//!                                                        Completed(CompletedRun)
//! ```
//!
//! The machine runs inside the stream: dropping the stream cancels the run at
//! its next await point, leaving the last persisted checkpoint behind.

use crate::error::Result;
use crate::graph::Node;
use crate::interrupt::{HumanInput, Suspension};
use crate::machine::{CompletedRun, RunCheckpoint, RunOutcome, RunStatus, WorkflowMachine};
use crate::state::{QcResult, WorkflowState};
use crate::stream::{StepEvent, StepSink};
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Events produced while a run executes
pub type RunStream = Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send>>;

/// Item of a [`RunStream`]
#[derive(Debug)]
pub enum RunEvent {
    Step(StepEvent),
    Suspended(PendingReview),
    Completed(CompletedRun),
}

impl RunEvent {
    /// Whether this is the last event of the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Step(_))
    }
}

/// Outcome of a waited-for start or resume
#[derive(Debug)]
pub enum DriverOutcome {
    Completed(CompletedRun),
    Suspended(PendingReview),
}

impl DriverOutcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self, DriverOutcome::Suspended(_))
    }

    pub fn completed(self) -> Option<CompletedRun> {
        match self {
            DriverOutcome::Completed(run) => Some(run),
            DriverOutcome::Suspended(_) => None,
        }
    }

    pub fn pending(self) -> Option<PendingReview> {
        match self {
            DriverOutcome::Suspended(pending) => Some(pending),
            DriverOutcome::Completed(_) => None,
        }
    }
}

/// A run waiting for a reviewer, with a continuation to resume it
#[derive(Clone)]
pub struct PendingReview {
    driver: RunDriver,
    pub session_key: String,
    pub reasoning: String,
    pub current_translation: String,
    pub qc: Option<QcResult>,
}

impl PendingReview {
    fn new(driver: RunDriver, suspension: Suspension) -> Self {
        Self {
            driver,
            session_key: suspension.session_key,
            reasoning: suspension.reasoning,
            current_translation: suspension.current_translation,
            qc: suspension.qc,
        }
    }

    /// Continue the run with the reviewer's translation
    pub async fn resume(self, corrected_text: impl Into<String>) -> Result<DriverOutcome> {
        self.driver.resume(&self.session_key, corrected_text).await
    }

    pub fn resume_stream(self, corrected_text: impl Into<String>) -> RunStream {
        self.driver.resume_stream(&self.session_key, corrected_text)
    }
}

impl fmt::Debug for PendingReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReview")
            .field("session_key", &self.session_key)
            .field("reasoning", &self.reasoning)
            .field("current_translation", &self.current_translation)
            .field("qc", &self.qc)
            .finish()
    }
}

/// Fresh random session key
pub fn new_session_key() -> String {
    Uuid::new_v4().to_string()
}

/// Starts, streams and resumes runs
#[derive(Clone)]
pub struct RunDriver {
    machine: Arc<WorkflowMachine>,
}

impl fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunDriver").field("machine", &self.machine).finish()
    }
}

impl RunDriver {
    pub fn new(machine: WorkflowMachine) -> Self {
        Self::from_arc(Arc::new(machine))
    }

    pub fn from_arc(machine: Arc<WorkflowMachine>) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &WorkflowMachine {
        &self.machine
    }

    /// Start a run under a fresh session key and wait for it to finish or park
    pub async fn invoke(&self, source_text: &str, target_language: &str) -> Result<DriverOutcome> {
        self.invoke_with_session(&new_session_key(), source_text, target_language)
            .await
    }

    pub async fn invoke_with_session(
        &self,
        session_key: &str,
        source_text: &str,
        target_language: &str,
    ) -> Result<DriverOutcome> {
        let state = self.seed(source_text, target_language).await;
        let outcome = self
            .machine
            .start(session_key, state, &StepSink::none())
            .await?;
        Ok(self.outcome(outcome))
    }

    /// Resume a parked run and wait for it to finish
    pub async fn resume(
        &self,
        session_key: &str,
        corrected_text: impl Into<String>,
    ) -> Result<DriverOutcome> {
        let outcome = self
            .machine
            .resume(session_key, HumanInput::new(corrected_text), &StepSink::none())
            .await?;
        Ok(self.outcome(outcome))
    }

    /// Start a run under a fresh session key, streaming step events
    pub fn run(&self, source_text: &str, target_language: &str) -> RunStream {
        self.run_with_session(&new_session_key(), source_text, target_language)
    }

    pub fn run_with_session(
        &self,
        session_key: &str,
        source_text: &str,
        target_language: &str,
    ) -> RunStream {
        let driver = self.clone();
        let session_key = session_key.to_string();
        let source_text = source_text.to_string();
        let target_language = target_language.to_string();

        self.stream(move |sink| async move {
            let state = driver.seed(&source_text, &target_language).await;
            driver.machine.start(&session_key, state, &sink).await
        })
    }

    /// Resume a parked run, streaming step events
    pub fn resume_stream(&self, session_key: &str, corrected_text: impl Into<String>) -> RunStream {
        let driver = self.clone();
        let session_key = session_key.to_string();
        let input = HumanInput::new(corrected_text);

        self.stream(move |sink| async move { driver.machine.resume(&session_key, input, &sink).await })
    }

    /// Stored run for `session_key`, if any
    pub async fn status(&self, session_key: &str) -> Result<Option<RunCheckpoint>> {
        self.machine.checkpoint(session_key).await
    }

    /// Continuation for a run parked by an earlier process
    pub async fn pending_review(&self, session_key: &str) -> Result<Option<PendingReview>> {
        let Some(run) = self.machine.checkpoint(session_key).await? else {
            return Ok(None);
        };
        if run.status != RunStatus::Suspended || run.next != Node::HumanReview {
            return Ok(None);
        }

        let qc = run.state.qc_result().cloned();
        Ok(Some(PendingReview {
            driver: self.clone(),
            session_key: run.session_key,
            reasoning: qc.as_ref().map(|qc| qc.reasoning().to_string()).unwrap_or_default(),
            current_translation: run.state.translated_text().unwrap_or_default().to_string(),
            qc,
        }))
    }

    async fn seed(&self, source_text: &str, target_language: &str) -> WorkflowState {
        let history = self.machine.corrections().load_all().await;
        debug!(entries = history.len(), "Seeding run with correction history");
        WorkflowState::new(source_text, target_language).with_history(history)
    }

    fn outcome(&self, outcome: RunOutcome) -> DriverOutcome {
        match outcome {
            RunOutcome::Completed(run) => DriverOutcome::Completed(run),
            RunOutcome::Suspended(suspension) => {
                DriverOutcome::Suspended(PendingReview::new(self.clone(), suspension))
            }
        }
    }

    /// Drive `run` while forwarding its step events
    fn stream<F, Fut>(&self, run: F) -> RunStream
    where
        F: FnOnce(StepSink) -> Fut + Send + 'static,
        Fut: Future<Output = Result<RunOutcome>> + Send + 'static,
    {
        enum Next {
            Event(StepEvent),
            Done(Result<RunOutcome>),
        }

        let driver = self.clone();
        let stream = async_stream::stream! {
            let (sink, mut rx) = StepSink::channel();
            let execution = run(sink);
            tokio::pin!(execution);

            let result = loop {
                let next = tokio::select! {
                    biased;
                    Some(event) = rx.recv() => Next::Event(event),
                    result = &mut execution => Next::Done(result),
                };
                match next {
                    Next::Event(event) => yield Ok(RunEvent::Step(event)),
                    Next::Done(result) => break result,
                }
            };

            while let Ok(event) = rx.try_recv() {
                yield Ok(RunEvent::Step(event));
            }

            match result {
                Ok(RunOutcome::Completed(run)) => yield Ok(RunEvent::Completed(run)),
                Ok(RunOutcome::Suspended(suspension)) => {
                    yield Ok(RunEvent::Suspended(PendingReview::new(driver, suspension)))
                }
                Err(e) => yield Err(e),
            }
        };

        Box::pin(stream)
    }
}
