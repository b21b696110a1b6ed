//! Backend abstraction for IAM operations.
//!
//! The [`Backend`] trait defines the interface for talking to the provider,
//! allowing for different implementations (the `aws` CLI, an in-memory
//! account for tests and dry runs).

pub mod aws_cli;
pub mod memory;

use crate::error::Result;
use crate::types::{CreatePolicyRequest, EntityKind, Policy, PolicyEntities};
use std::sync::Arc;

/// Backend trait for IAM policy operations.
///
/// Implementations are shared across the detach fan-out, so they must be
/// `Send + Sync`. No method retries; retrying is the [`crate::Client`]'s job.
pub trait Backend: Send + Sync {
    /// Create a managed policy.
    fn create_policy(&self, request: &CreatePolicyRequest) -> Result<Policy>;

    /// Read a managed policy. Fails with a not-found error if it is absent.
    fn get_policy(&self, arn: &str) -> Result<Policy>;

    /// List the groups, roles and users the policy is attached to.
    fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities>;

    /// Detach the policy from a group.
    fn detach_group_policy(&self, arn: &str, group: &str) -> Result<()>;

    /// Detach the policy from a role.
    fn detach_role_policy(&self, arn: &str, role: &str) -> Result<()>;

    /// Detach the policy from a user.
    fn detach_user_policy(&self, arn: &str, user: &str) -> Result<()>;

    /// Delete a managed policy.
    fn delete_policy(&self, arn: &str) -> Result<()>;

    /// Detach the policy from an entity of the given kind.
    fn detach(&self, kind: EntityKind, arn: &str, entity: &str) -> Result<()> {
        match kind {
            EntityKind::Group => self.detach_group_policy(arn, entity),
            EntityKind::Role => self.detach_role_policy(arn, entity),
            EntityKind::User => self.detach_user_policy(arn, entity),
        }
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn create_policy(&self, request: &CreatePolicyRequest) -> Result<Policy> {
        (**self).create_policy(request)
    }

    fn get_policy(&self, arn: &str) -> Result<Policy> {
        (**self).get_policy(arn)
    }

    fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities> {
        (**self).list_entities_for_policy(arn)
    }

    fn detach_group_policy(&self, arn: &str, group: &str) -> Result<()> {
        (**self).detach_group_policy(arn, group)
    }

    fn detach_role_policy(&self, arn: &str, role: &str) -> Result<()> {
        (**self).detach_role_policy(arn, role)
    }

    fn detach_user_policy(&self, arn: &str, user: &str) -> Result<()> {
        (**self).detach_user_policy(arn, user)
    }

    fn delete_policy(&self, arn: &str) -> Result<()> {
        (**self).delete_policy(arn)
    }
}

/// Get the default backend (the `aws` CLI on PATH).
pub fn default_backend() -> Result<aws_cli::AwsCliBackend> {
    aws_cli::AwsCliBackend::new()
}
