//! Error types for IAM operations.
//!
//! Errors are categorized so callers can tell transient failures (worth
//! retrying) from terminal ones, and can recognize the "already gone"
//! class that removal treats as success.

use thiserror::Error;

/// Categories of IAM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection-level failure (transient, retryable)
    Network,
    /// Request rate exceeded (transient, retryable)
    Throttling,
    /// The entity does not exist
    NotFound,
    /// The policy exists but cannot be attached or detached
    NotAttachable,
    /// An entity with the same name already exists
    AlreadyExists,
    /// Account quota reached
    LimitExceeded,
    /// Entity is still referenced (e.g. policy still attached)
    Conflict,
    /// Caller is not authorized
    Permission,
    /// Malformed request or policy document
    InvalidInput,
    /// The `aws` executable is missing
    CliNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Throttling)
    }

    /// Whether the target is already absent, so a removal has nothing left to do.
    pub fn is_already_gone(&self) -> bool {
        matches!(self, Self::NotFound | Self::NotAttachable)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Throttling => "Request throttled",
            Self::NotFound => "Entity not found",
            Self::NotAttachable => "Policy not attachable",
            Self::AlreadyExists => "Entity already exists",
            Self::LimitExceeded => "Account limit exceeded",
            Self::Conflict => "Entity still in use",
            Self::Permission => "Access denied",
            Self::InvalidInput => "Invalid request",
            Self::CliNotFound => "AWS CLI not installed",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur during IAM operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error (connection reset, DNS, endpoint unreachable)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message
        message: String,
    },

    /// Request was throttled by the provider
    #[error("throttled: {message}")]
    Throttling {
        /// Provider message
        message: String,
    },

    /// Entity does not exist
    #[error("not found: {message}")]
    NotFound {
        /// Provider message
        message: String,
    },

    /// Policy cannot be attached/detached
    #[error("not attachable: {message}")]
    NotAttachable {
        /// Provider message
        message: String,
    },

    /// Entity with this name already exists
    #[error("already exists: {name}")]
    AlreadyExists {
        /// Name of the conflicting entity
        name: String,
    },

    /// Quota exceeded
    #[error("limit exceeded: {message}")]
    LimitExceeded {
        /// Provider message
        message: String,
    },

    /// Entity is still referenced
    #[error("conflict: {message}")]
    Conflict {
        /// Provider message
        message: String,
    },

    /// Access denied
    #[error("permission denied: {message}")]
    Permission {
        /// Provider message
        message: String,
    },

    /// Malformed request or document
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Provider message
        message: String,
    },

    /// AWS CLI is not installed or not in PATH
    #[error("AWS CLI not found. Install it from https://aws.amazon.com/cli/")]
    CliNotFound,

    /// Command execution failed without a recognizable provider error
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::Throttling { .. } => ErrorCategory::Throttling,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::NotAttachable { .. } => ErrorCategory::NotAttachable,
            Error::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            Error::LimitExceeded { .. } => ErrorCategory::LimitExceeded,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::InvalidInput { .. } => ErrorCategory::InvalidInput,
            Error::CliNotFound => ErrorCategory::CliNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error means the target no longer exists.
    pub fn is_already_gone(&self) -> bool {
        self.category().is_already_gone()
    }

    /// Create an error from a provider error message.
    ///
    /// Accepts both the error-code form (`An error occurred (NoSuchEntity) ...`)
    /// and bare messages. `name` is the entity the request was about, if known.
    pub fn from_aws_output(stderr: &str, name: Option<&str>) -> Self {
        let lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if lower.contains("throttling")
            || lower.contains("rate exceeded")
            || lower.contains("too many requests")
            || lower.contains("requestlimitexceeded")
        {
            return Error::Throttling { message };
        }

        if lower.contains("could not connect")
            || lower.contains("connect timeout")
            || lower.contains("read timeout")
            || lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("name resolution")
        {
            return Error::Network { message };
        }

        if lower.contains("nosuchentity") || lower.contains("does not exist") {
            return Error::NotFound { message };
        }

        if lower.contains("not attachable") {
            return Error::NotAttachable { message };
        }

        if lower.contains("entityalreadyexists") || lower.contains("already exists") {
            return Error::AlreadyExists {
                name: name.unwrap_or("unknown").to_string(),
            };
        }

        if lower.contains("limitexceeded") {
            return Error::LimitExceeded { message };
        }

        if lower.contains("deleteconflict") || lower.contains("must detach") {
            return Error::Conflict { message };
        }

        if lower.contains("accessdenied")
            || lower.contains("not authorized")
            || lower.contains("unauthorizedoperation")
            || lower.contains("expiredtoken")
        {
            return Error::Permission { message };
        }

        if lower.contains("malformedpolicydocument")
            || lower.contains("invalidinput")
            || lower.contains("validationerror")
        {
            return Error::InvalidInput { message };
        }

        Error::CommandFailed {
            message: format!(
                "aws iam command failed{}",
                name.map(|n| format!(" for {n}")).unwrap_or_default()
            ),
            stderr: message,
        }
    }
}

/// Result type for IAM operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Throttling.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Conflict.is_retryable());
    }

    #[test]
    fn test_error_category_already_gone() {
        assert!(ErrorCategory::NotFound.is_already_gone());
        assert!(ErrorCategory::NotAttachable.is_already_gone());
        assert!(!ErrorCategory::Permission.is_already_gone());
    }

    #[test]
    fn test_from_aws_output_does_not_exist() {
        let err = Error::from_aws_output(
            "An error occurred (NoSuchEntity) when calling the DeletePolicy operation: \
             Policy arn:aws:iam::123456789012:policy/app does not exist or is not attachable.",
            Some("app"),
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.is_already_gone());
    }

    #[test]
    fn test_from_aws_output_not_attachable() {
        let err = Error::from_aws_output("Policy is not attachable", None);
        assert_eq!(err.category(), ErrorCategory::NotAttachable);
        assert!(err.is_already_gone());
    }

    #[test]
    fn test_from_aws_output_throttling() {
        let err = Error::from_aws_output(
            "An error occurred (Throttling) when calling the CreatePolicy operation: Rate exceeded",
            Some("app"),
        );
        assert_eq!(err.category(), ErrorCategory::Throttling);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_aws_output_already_exists() {
        let err = Error::from_aws_output(
            "An error occurred (EntityAlreadyExists) when calling the CreatePolicy operation: \
             A policy called app already exists. Duplicate names are not allowed.",
            Some("app"),
        );
        assert!(matches!(err, Error::AlreadyExists { ref name } if name == "app"));
    }

    #[test]
    fn test_from_aws_output_delete_conflict() {
        let err = Error::from_aws_output(
            "An error occurred (DeleteConflict) when calling the DeletePolicy operation: \
             Cannot delete a policy attached to entities.",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(!err.is_already_gone());
    }

    #[test]
    fn test_from_aws_output_access_denied() {
        let err = Error::from_aws_output(
            "An error occurred (AccessDenied) when calling the DeletePolicy operation: \
             User is not authorized to perform: iam:DeletePolicy",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_from_aws_output_unknown() {
        let err = Error::from_aws_output("something odd happened", Some("app"));
        assert_eq!(err.category(), ErrorCategory::Other);
        assert!(err.to_string().contains("for app"));
    }
}
