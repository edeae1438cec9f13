//! Human review suspension

use crate::graph::Node;
use crate::state::QcResult;
use serde::{Deserialize, Serialize};

/// A run parked at a suspend point, waiting for a human
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub session_key: String,
    pub node: Node,
    /// QC explanation shown to the reviewer
    pub reasoning: String,
    pub current_translation: String,
    pub qc: Option<QcResult>,
}

/// Reviewer's answer to a [`Suspension`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanInput {
    pub corrected_text: String,
}

impl HumanInput {
    pub fn new(corrected_text: impl Into<String>) -> Self {
        Self {
            corrected_text: corrected_text.into(),
        }
    }
}
