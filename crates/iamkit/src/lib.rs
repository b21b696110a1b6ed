//! # iamkit
//!
//! IAM managed-policy operations behind a pluggable backend.
//!
//! This crate provides:
//! - A [`Backend`](backend::Backend) trait covering create, read, list
//!   attachments, detach and delete
//! - An `aws` CLI backend and an in-memory backend for tests and dry runs
//! - Error classification (retryable, "already gone") from provider messages
//! - Retry with exponential backoff for throttling and network failures
//!
//! ## Example
//!
//! ```no_run
//! use iamkit::Client;
//! use iamkit::backend::memory::MemoryBackend;
//!
//! let client = Client::with_backend(Box::new(MemoryBackend::new()));
//! let document = serde_json::json!({"Version": "2012-10-17", "Statement": []});
//!
//! let policy = client.create_policy("app", "/", &document).unwrap();
//! for (kind, name) in client.list_entities_for_policy(&policy.arn).unwrap().iter() {
//!     client.detach(kind, &policy.arn, name).unwrap();
//! }
//! client.delete_policy(&policy.arn).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    CreatePolicyRequest, EntityKind, Operation, Policy, PolicyEntities, RetryConfig,
};

use backend::Backend;

/// High-level client for IAM policy operations.
///
/// The client wraps a backend, serializes policy documents at the
/// boundary, retries transient failures and makes detach idempotent.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a new Client with the default backend.
    ///
    /// Returns an error if the AWS CLI is not installed.
    pub fn new() -> Result<Self> {
        let backend = backend::default_backend()?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry configuration.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The active retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    fn retrying<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), operation)
    }

    // =========================================================================
    // Policy Operations
    // =========================================================================

    /// Create a managed policy from a structured document.
    pub fn create_policy(
        &self,
        name: &str,
        path: &str,
        document: &serde_json::Value,
    ) -> Result<Policy> {
        let request = CreatePolicyRequest {
            name: name.to_string(),
            path: path.to_string(),
            document: serde_json::to_string(document)?,
        };
        self.retrying(|| self.backend.create_policy(&request))
    }

    /// Read a managed policy.
    pub fn get_policy(&self, arn: &str) -> Result<Policy> {
        self.retrying(|| self.backend.get_policy(arn))
    }

    /// Whether a managed policy is currently visible.
    pub fn policy_exists(&self, arn: &str) -> Result<bool> {
        match self.get_policy(arn) {
            Ok(_) => Ok(true),
            Err(e) if e.category() == ErrorCategory::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a managed policy.
    pub fn delete_policy(&self, arn: &str) -> Result<()> {
        self.retrying(|| self.backend.delete_policy(arn))
    }

    // =========================================================================
    // Attachment Operations
    // =========================================================================

    /// List the entities the policy is attached to.
    pub fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities> {
        self.retrying(|| self.backend.list_entities_for_policy(arn))
    }

    /// Detach the policy from an entity.
    ///
    /// Detaching from an entity the policy is no longer attached to, or a
    /// policy that no longer exists, succeeds.
    pub fn detach(&self, kind: EntityKind, arn: &str, entity: &str) -> Result<()> {
        match self.retrying(|| self.backend.detach(kind, arn, entity)) {
            Err(e) if e.is_already_gone() => {
                log::debug!("{kind} {entity} already detached from {arn}");
                Ok(())
            }
            other => other,
        }
    }
}
