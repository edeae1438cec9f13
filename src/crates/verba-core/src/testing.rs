//! Test doubles
//!
//! Scripted adapters and failing stores for exercising the machine without a
//! translation service, plus [`TestHarness`] wiring them to in-memory
//! persistence.
//!
//! ```rust
//! use verba_core::testing::{ScriptedQualityChecker, ScriptedTranslator, TestHarness};
//!
//! # tokio_test_block(async {
//! let harness = TestHarness::new(
//!     ScriptedTranslator::always("Bonjour"),
//!     ScriptedQualityChecker::scores(9, 3, "ok"),
//! );
//! let outcome = harness.driver().invoke("Hello", "French").await.unwrap();
//! assert!(!outcome.is_suspended());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use crate::adapters::{
    AdapterError, QcRequest, QualityChecker, TranslationRequest, TranslationResponse, Translator,
};
use crate::audit::{AuditEntry, AuditLog, InMemoryAuditLog};
use crate::driver::RunDriver;
use crate::error::{Result, WorkflowError};
use crate::machine::WorkflowMachine;
use crate::state::Correction;
use crate::store::{CorrectionStore, InMemoryCorrectionStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use verba_checkpoint::InMemoryCheckpointSaver;

type Reply<T> = std::result::Result<T, AdapterError>;

/// Replies queued in order, then a fallback
#[derive(Debug, Default)]
struct Script<T> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Option<T>,
}

impl<T: Clone> Script<T> {
    fn next(&self) -> Reply<T> {
        if let Some(reply) = self.queue.lock().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .ok_or_else(|| AdapterError::InvalidResponse("script exhausted".to_string()))
    }
}

/// Translator returning scripted texts and recording requests
#[derive(Debug, Default)]
pub struct ScriptedTranslator {
    script: Script<String>,
    requests: Mutex<Vec<TranslationRequest>>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `text`
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            script: Script {
                queue: Mutex::new(VecDeque::new()),
                fallback: Some(text.into()),
            },
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.script.queue.lock().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, err: AdapterError) -> Self {
        self.script.queue.lock().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Reply<TranslationResponse> {
        self.requests.lock().push(request.clone());
        self.script.next().map(|translated_text| TranslationResponse { translated_text })
    }
}

/// Quality checker returning scripted raw generator output
#[derive(Debug, Default)]
pub struct ScriptedQualityChecker {
    script: Script<String>,
    requests: Mutex<Vec<QcRequest>>,
}

impl ScriptedQualityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `raw`
    pub fn always(raw: impl Into<String>) -> Self {
        Self {
            script: Script {
                queue: Mutex::new(VecDeque::new()),
                fallback: Some(raw.into()),
            },
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with a well-formed score object
    pub fn scores(accuracy: i64, hallucination: i64, reasoning: &str) -> Self {
        Self::always(score_json(accuracy, hallucination, reasoning))
    }

    pub fn reply(self, raw: impl Into<String>) -> Self {
        self.script.queue.lock().push_back(Ok(raw.into()));
        self
    }

    pub fn fail(self, err: AdapterError) -> Self {
        self.script.queue.lock().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<QcRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl QualityChecker for ScriptedQualityChecker {
    async fn check(&self, request: &QcRequest) -> Reply<String> {
        self.requests.lock().push(request.clone());
        self.script.next()
    }
}

/// Raw QC output in the service's shape
pub fn score_json(accuracy: i64, hallucination: i64, reasoning: &str) -> String {
    serde_json::json!({
        "accuracy_score": accuracy,
        "hallucination_score": hallucination,
        "reasoning": reasoning,
        "is_pass": false,
    })
    .to_string()
}

/// Correction store whose writes always fail
#[derive(Debug, Default)]
pub struct FailingCorrectionStore;

#[async_trait]
impl CorrectionStore for FailingCorrectionStore {
    async fn record(&self, _source: &str, _correction: &str) -> Result<bool> {
        Err(WorkflowError::Persistence("correction store unavailable".to_string()))
    }

    async fn load_all(&self) -> Vec<Correction> {
        Vec::new()
    }
}

/// Audit log whose appends always fail
#[derive(Debug, Default)]
pub struct FailingAuditLog;

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _entry: &AuditEntry) -> Result<()> {
        Err(WorkflowError::Persistence("audit log unavailable".to_string()))
    }

    async fn entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(Vec::new())
    }
}

/// Scripted adapters wired to in-memory stores
pub struct TestHarness {
    pub translator: Arc<ScriptedTranslator>,
    pub quality: Arc<ScriptedQualityChecker>,
    pub corrections: Arc<dyn CorrectionStore>,
    pub audit: Arc<dyn AuditLog>,
    pub checkpointer: Arc<InMemoryCheckpointSaver>,
}

impl TestHarness {
    pub fn new(translator: ScriptedTranslator, quality: ScriptedQualityChecker) -> Self {
        Self {
            translator: Arc::new(translator),
            quality: Arc::new(quality),
            corrections: Arc::new(InMemoryCorrectionStore::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            checkpointer: Arc::new(InMemoryCheckpointSaver::new()),
        }
    }

    pub fn with_corrections(mut self, store: Arc<dyn CorrectionStore>) -> Self {
        self.corrections = store;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Fresh machine over the shared stores
    pub fn machine(&self) -> WorkflowMachine {
        WorkflowMachine::new(
            self.translator.clone(),
            self.quality.clone(),
            self.corrections.clone(),
            self.audit.clone(),
            self.checkpointer.clone(),
        )
    }

    pub fn driver(&self) -> RunDriver {
        RunDriver::new(self.machine())
    }

    /// Audit entries, empty if the log cannot be read
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries().await.unwrap_or_default()
    }
}
