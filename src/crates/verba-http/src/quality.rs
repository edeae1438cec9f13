//! `POST /AI_QC`

use crate::client::ServiceClient;
use async_trait::async_trait;
use serde::Serialize;
use verba_core::{AdapterError, QcRequest, QualityChecker};

pub const QC_PATH: &str = "/AI_QC";

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    source_text: &'a str,
    translated_text: &'a str,
}

/// Quality checker backed by the QC service
///
/// The reply body is handed to the workflow's repair parser as-is, so a
/// service that leaks fenced or loosely quoted output still gets scored.
#[derive(Debug, Clone)]
pub struct HttpQualityChecker {
    client: ServiceClient,
}

impl HttpQualityChecker {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QualityChecker for HttpQualityChecker {
    async fn check(&self, request: &QcRequest) -> Result<String, AdapterError> {
        let body = WireRequest {
            source_text: &request.source_text,
            translated_text: &request.translated_text,
        };
        Ok(self.client.post_text(QC_PATH, &body).await?)
    }
}
