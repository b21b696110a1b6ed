//! Lifecycle errors

use std::time::Duration;
use thiserror::Error;

/// Broad class of a lifecycle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid inputs; retrying will not help
    Configuration,
    /// A provider call failed
    RemoteOperation,
    /// A bounded wait ran out of time
    Timeout,
    /// The caller cancelled the pass
    Cancelled,
}

/// A dependent entity that could not be released before removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentFailure {
    /// Entity description, e.g. "role lambda-exec"
    pub entity: String,
    /// Error reported for that entity
    pub error: String,
}

/// Errors surfaced by component lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Required input missing or malformed
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A provider call failed
    #[error("{operation} failed for {resource}: {source}")]
    RemoteOperation {
        resource: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One or more dependents could not be released; removal was not attempted
    #[error(
        "could not release {count} dependent(s) of {resource}: {details}",
        count = .failures.len(),
        details = join_failures(.failures)
    )]
    Dependents {
        resource: String,
        failures: Vec<DependentFailure>,
    },

    /// Waiting for the remote side exceeded its bound
    #[error("timed out after {waited:?} waiting for {resource}")]
    Timeout { resource: String, waited: Duration },

    /// The caller cancelled while the operation was waiting
    #[error("cancelled while waiting for {resource}")]
    Cancelled { resource: String },
}

fn join_failures(failures: &[DependentFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.entity, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl LifecycleError {
    /// Build a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a provider error with the resource and operation it came from.
    pub fn remote(
        resource: impl Into<String>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RemoteOperation {
            resource: resource.into(),
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// The broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::RemoteOperation { .. } | Self::Dependents { .. } => ErrorKind::RemoteOperation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}
