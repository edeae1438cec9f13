//! External step adapters
//!
//! The engine delegates generation to two opaque services. These traits are
//! the whole contract; `verba-http` implements them over HTTP and
//! [`crate::testing`] provides scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request sent to the translation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: String,
    /// Few-shot hint built from prior corrections
    pub extra_prompt: Option<String>,
}

/// Translation service reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translated_text: String,
}

/// Request sent to the quality-check service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcRequest {
    pub source_text: String,
    pub translated_text: String,
}

/// Failure of an external step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Connection refused, reset, timed out
    #[error("transport failure: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered 2xx with a body that does not match the contract
    #[error("malformed response: {0}")]
    InvalidResponse(String),
}

impl AdapterError {
    /// Transport-level failures and overload statuses
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Transport(_) => true,
            AdapterError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            AdapterError::InvalidResponse(_) => false,
        }
    }
}

/// Translation step
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, AdapterError>;
}

/// Quality-check step
///
/// Returns the raw generator text; scoring goes through the repair parser.
#[async_trait]
pub trait QualityChecker: Send + Sync {
    async fn check(&self, request: &QcRequest) -> Result<String, AdapterError>;
}
