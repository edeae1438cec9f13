//! Async utilities for common async patterns
//!
//! Currently this is the retry machinery used by the HTTP adapters:
//!
//! ```rust,ignore
//! use tooling::async_utils::retry::{RetryPolicy, with_retry_if};
//!
//! let policy = RetryPolicy::new(3).with_initial_interval(0.5);
//! let body = with_retry_if(&policy, || client.post(url).send(), |e| e.is_timeout()).await?;
//! ```

pub mod retry;

pub use retry::{with_retry, with_retry_if, RetryPolicy};
