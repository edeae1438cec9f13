//! # verba-http
//!
//! reqwest implementations of the workflow's [`Translator`](verba_core::Translator)
//! and [`QualityChecker`](verba_core::QualityChecker) for the translation
//! microservice:
//!
//! | Endpoint              | Request                                    | Reply                 |
//! |-----------------------|--------------------------------------------|-----------------------|
//! | `POST /AI_Translation`| `{text, target_language, extra_prompt}`    | `{translated_text}`   |
//! | `POST /AI_QC`         | `{source_text, translated_text}`           | score object (raw)    |
//! | `GET /docs`           |                                            | health probe          |
//!
//! Transport failures and 429/502/503/504 are retried with exponential
//! backoff; everything else surfaces immediately.
//!
//! ```rust,no_run
//! use verba_http::{HttpQualityChecker, HttpTranslator, ServiceClient, ServiceConfig};
//!
//! # fn main() -> verba_http::Result<()> {
//! let client = ServiceClient::new(ServiceConfig::new("http://localhost:8000"))?;
//! let translator = HttpTranslator::new(client.clone());
//! let checker = HttpQualityChecker::new(client);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod quality;
pub mod translator;

pub use client::ServiceClient;
pub use config::{ServiceConfig, DEFAULT_BASE_URL};
pub use error::{HttpAdapterError, Result};
pub use quality::{HttpQualityChecker, QC_PATH};
pub use translator::{strip_reasoning, HttpTranslator, TRANSLATION_PATH};
