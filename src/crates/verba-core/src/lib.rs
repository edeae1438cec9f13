//! # verba-core
//!
//! Resumable translation workflow with a human in the loop.
//!
//! A run translates a source text, scores the translation, and either saves
//! it or parks itself until a reviewer supplies a corrected translation.
//! Corrections are remembered and replayed as few-shot hints to later runs.
//!
//! ```text
//!  RunDriver ── seed history ──▶ CorrectionStore ◀── record ──┐
//!      │                                                      │
//!      │ start / resume                                       │
//!      ▼                                                      │
//!  WorkflowMachine                                            │
//!      translate ──▶ qc ──┬── pass ─────────────────▶ save_result ──▶ end
//!          │          │   └── fail ──▶ human_review ──┘   │
//!          ▼          ▼               (suspend)           ▼
//!     Translator  QualityChecker ──▶ repair parser     AuditLog
//!
//!  every completed node is persisted through a CheckpointSaver
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use verba_core::testing::{ScriptedQualityChecker, ScriptedTranslator};
//! use verba_core::{
//!     DriverOutcome, InMemoryAuditLog, InMemoryCorrectionStore, RunDriver, WorkflowMachine,
//! };
//! use verba_checkpoint::InMemoryCheckpointSaver;
//!
//! # fn main() -> verba_core::Result<()> {
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let machine = WorkflowMachine::new(
//!     Arc::new(ScriptedTranslator::always("Bonjour")),
//!     Arc::new(ScriptedQualityChecker::scores(4, 9, "too literal")),
//!     Arc::new(InMemoryCorrectionStore::new()),
//!     Arc::new(InMemoryAuditLog::new()),
//!     Arc::new(InMemoryCheckpointSaver::new()),
//! );
//! let driver = RunDriver::new(machine);
//!
//! let DriverOutcome::Suspended(review) = driver.invoke("Hello", "French").await? else {
//!     unreachable!();
//! };
//! assert_eq!(review.reasoning, "too literal");
//!
//! let run = review.resume("Salut").await?.completed().unwrap();
//! assert_eq!(run.audit.final_translation, "Salut");
//! # Ok(())
//! # })
//! # }
//! ```

pub mod adapters;
pub mod audit;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod machine;
pub mod repair;
pub mod state;
pub mod store;
pub mod stream;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapters::{
    AdapterError, QcRequest, QualityChecker, TranslationRequest, TranslationResponse, Translator,
};
pub use audit::{AuditEntry, AuditLog, InMemoryAuditLog, JsonlAuditLog};
pub use config::{EngineConfig, DEFAULT_PASS_THRESHOLD};
pub use driver::{new_session_key, DriverOutcome, PendingReview, RunDriver, RunEvent, RunStream};
pub use error::{Result, WorkflowError};
pub use graph::{route_after_qc, Node};
pub use interrupt::{HumanInput, Suspension};
pub use machine::{CompletedRun, RunCheckpoint, RunOutcome, RunStatus, WorkflowMachine};
pub use repair::{parse_qc_output, RepairStrategy};
pub use state::{Correction, QcResult, WorkflowState};
pub use store::{CorrectionStore, FileCorrectionStore, InMemoryCorrectionStore};
pub use stream::{StepEvent, StepSink};
