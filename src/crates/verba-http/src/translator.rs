//! `POST /AI_Translation`

use crate::client::ServiceClient;
use crate::error::HttpAdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use verba_core::{AdapterError, TranslationRequest, TranslationResponse, Translator};

pub const TRANSLATION_PATH: &str = "/AI_Translation";

const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    text: &'a str,
    target_language: &'a str,
    extra_prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    translated_text: String,
}

/// Translator backed by the translation service
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: ServiceClient,
}

impl HttpTranslator {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, AdapterError> {
        let body = WireRequest {
            text: &request.text,
            target_language: &request.target_language,
            extra_prompt: request.extra_prompt.as_deref().unwrap_or(""),
        };

        let reply: WireResponse = self.client.post_json(TRANSLATION_PATH, &body).await?;
        let translated_text = strip_reasoning(&reply.translated_text);
        if translated_text.is_empty() {
            return Err(HttpAdapterError::InvalidResponse(
                "translated_text is empty".to_string(),
            )
            .into());
        }

        Ok(TranslationResponse {
            translated_text: translated_text.to_string(),
        })
    }
}

/// Drop a reasoning model's `<think>` preamble
///
/// Everything up to the last closing marker is discarded and the rest trimmed.
pub fn strip_reasoning(text: &str) -> &str {
    match text.rfind(THINK_CLOSE) {
        Some(idx) => text[idx + THINK_CLOSE.len()..].trim(),
        None => text.trim(),
    }
}
