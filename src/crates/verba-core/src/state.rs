//! Workflow state threaded through every node
//!
//! `source_text` and `target_language` are fixed at construction. The
//! translation can only change through [`WorkflowState::set_translation`],
//! which drops any QC result, so a stored `qc_result` always scores the
//! current `translated_text`.

use serde::{Deserialize, Serialize};

/// Scores for one translation
///
/// Built only by the repair parser's normalization step, which derives
/// `is_pass` locally from the scores and the pass threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcResult {
    accuracy_score: u8,
    hallucination_score: u8,
    reasoning: String,
    is_pass: bool,
}

impl QcResult {
    pub(crate) fn from_normalized(
        accuracy_score: u8,
        hallucination_score: u8,
        reasoning: String,
        is_pass: bool,
    ) -> Self {
        Self {
            accuracy_score,
            hallucination_score,
            reasoning,
            is_pass,
        }
    }

    /// Accuracy in `[1, 10]`
    pub fn accuracy_score(&self) -> u8 {
        self.accuracy_score
    }

    /// Hallucination score in `[1, 10]` (10 means none detected)
    pub fn hallucination_score(&self) -> u8 {
        self.hallucination_score
    }

    /// Generator's explanation of the scores
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Both scores reached the pass threshold
    pub fn is_pass(&self) -> bool {
        self.is_pass
    }
}

/// A human correction of a machine translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Source text that was translated
    pub source: String,
    /// Translation supplied by the reviewer
    pub correction: String,
}

impl Correction {
    pub fn new(source: impl Into<String>, correction: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            correction: correction.into(),
        }
    }
}

/// The single record every node reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    source_text: String,
    target_language: String,
    #[serde(default)]
    translated_text: Option<String>,
    #[serde(default)]
    qc_result: Option<QcResult>,
    #[serde(default)]
    correction_history: Vec<Correction>,
}

impl WorkflowState {
    /// Fresh state with no translation and no history
    pub fn new(source_text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            target_language: target_language.into(),
            translated_text: None,
            qc_result: None,
            correction_history: Vec::new(),
        }
    }

    /// Seed the few-shot history
    pub fn with_history(mut self, history: Vec<Correction>) -> Self {
        self.correction_history = history;
        self
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.translated_text.as_deref()
    }

    pub fn qc_result(&self) -> Option<&QcResult> {
        self.qc_result.as_ref()
    }

    pub fn correction_history(&self) -> &[Correction] {
        &self.correction_history
    }

    /// Replace the translation; any QC result is discarded
    pub fn set_translation(&mut self, text: impl Into<String>) {
        self.translated_text = Some(text.into());
        self.qc_result = None;
    }

    /// Attach the QC result for the current translation
    pub(crate) fn set_qc_result(&mut self, qc: QcResult) {
        self.qc_result = Some(qc);
    }

    pub(crate) fn replace_history(&mut self, history: Vec<Correction>) {
        self.correction_history = history;
    }

    /// Few-shot hint sent with the translation request
    ///
    /// `None` when there is no history.
    ///
    /// ```rust
    /// use verba_core::{Correction, WorkflowState};
    ///
    /// let state = WorkflowState::new("Hello", "French")
    ///     .with_history(vec![Correction::new("Hi", "Salut")]);
    /// assert_eq!(state.few_shot_hint().unwrap(), "History:\nSrc: Hi | Fix: Salut");
    /// ```
    pub fn few_shot_hint(&self) -> Option<String> {
        if self.correction_history.is_empty() {
            return None;
        }

        let lines: Vec<String> = self
            .correction_history
            .iter()
            .map(|c| format!("Src: {} | Fix: {}", c.source, c.correction))
            .collect();
        Some(format!("History:\n{}", lines.join("\n")))
    }
}
