//! Shared HTTP client for the translation service

use crate::config::ServiceConfig;
use crate::error::{HttpAdapterError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tooling::async_utils::{with_retry_if, RetryPolicy};
use tooling::config::ConfigBuilder;
use tracing::{debug, warn};

/// Pooled client with timeouts and transient-failure retries
#[derive(Debug, Clone)]
pub struct ServiceClient {
    config: ServiceConfig,
    client: Client,
    retry: RetryPolicy,
}

impl ServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.request_timeout())
            .pool_idle_timeout(config.pool_timeout())
            .pool_max_idle_per_host(config.max_idle_connections)
            .build()?;
        let retry = RetryPolicy::new(config.max_retries + 1);

        Ok(Self {
            config,
            client,
            retry,
        })
    }

    /// Replace the retry policy derived from `max_retries`
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// POST `body` as JSON and decode a JSON reply
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response
            .json::<Resp>()
            .await
            .map_err(|e| HttpAdapterError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// POST `body` as JSON and return the reply body unparsed
    pub async fn post_text<Req>(&self, path: &str, body: &Req) -> Result<String>
    where
        Req: Serialize + Sync + ?Sized,
    {
        let response = self.post(path, body).await?;
        Ok(response.text().await?)
    }

    /// Whether the service answers `GET /docs` with a success status
    pub async fn check_health(&self) -> bool {
        let url = self.config.url("/docs");
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }

    async fn post<Req>(&self, path: &str, body: &Req) -> Result<Response>
    where
        Req: Serialize + Sync + ?Sized,
    {
        let url = self.config.url(path);

        with_retry_if(
            &self.retry,
            || async {
                let response = self.client.post(&url).json(body).send().await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                if matches!(status.as_u16(), 429 | 502 | 503 | 504) {
                    warn!(url = %url, status = status.as_u16(), "Service overloaded");
                }
                Err(HttpAdapterError::Status {
                    status: status.as_u16(),
                    body,
                })
            },
            HttpAdapterError::is_transient,
        )
        .await
    }
}
