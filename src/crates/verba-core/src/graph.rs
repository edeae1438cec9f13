//! Workflow nodes and transitions
//!
//! ```text
//!  translate ──▶ qc ──┬── pass ──────────────────────▶ save_result ──▶ end
//!                     │                                    ▲
//!                     └── fail ──▶ human_review ───────────┘
//!                                  (suspend point)
//! ```
//!
//! There is no automatic retry edge back to `translate`.

use crate::state::{QcResult, WorkflowState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of the translation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Translate,
    Qc,
    HumanReview,
    SaveResult,
    End,
}

impl Node {
    /// Stable node name used in logs, events and checkpoints
    pub fn name(self) -> &'static str {
        match self {
            Node::Translate => "translate",
            Node::Qc => "qc",
            Node::HumanReview => "human_review",
            Node::SaveResult => "save_result",
            Node::End => "end",
        }
    }

    /// Whether execution halts here until a human supplies input
    pub fn is_suspend_point(self) -> bool {
        matches!(self, Node::HumanReview)
    }

    /// Node that follows `self` once it has completed against `state`
    ///
    /// A `qc` node that somehow left no result routes to review rather than
    /// letting an unscored translation through.
    pub fn successor(self, state: &WorkflowState) -> Node {
        match self {
            Node::Translate => Node::Qc,
            Node::Qc => match state.qc_result() {
                Some(qc) => route_after_qc(qc),
                None => Node::HumanReview,
            },
            Node::HumanReview => Node::SaveResult,
            Node::SaveResult | Node::End => Node::End,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conditional edge after `qc`
pub fn route_after_qc(qc: &QcResult) -> Node {
    if qc.is_pass() {
        Node::SaveResult
    } else {
        Node::HumanReview
    }
}
