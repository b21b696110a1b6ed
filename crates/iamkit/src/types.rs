//! Core types for IAM policy operations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of principal a managed policy can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// IAM group
    Group,
    /// IAM role
    Role,
    /// IAM user
    User,
}

impl EntityKind {
    /// All kinds, in listing order.
    pub const ALL: [EntityKind; 3] = [EntityKind::Group, EntityKind::Role, EntityKind::User];

    /// Lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::Role => "role",
            EntityKind::User => "user",
        }
    }

    /// The detach operation for this kind.
    pub fn detach_operation(&self) -> Operation {
        match self {
            EntityKind::Group => Operation::DetachGroupPolicy,
            EntityKind::Role => Operation::DetachRolePolicy,
            EntityKind::User => Operation::DetachUserPolicy,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider operations, named as the IAM API names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Create a managed policy
    CreatePolicy,
    /// Read a managed policy by ARN
    GetPolicy,
    /// List groups, roles and users a policy is attached to
    ListEntitiesForPolicy,
    /// Detach a policy from a group
    DetachGroupPolicy,
    /// Detach a policy from a role
    DetachRolePolicy,
    /// Detach a policy from a user
    DetachUserPolicy,
    /// Delete a managed policy
    DeletePolicy,
}

impl Operation {
    /// API name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePolicy => "CreatePolicy",
            Operation::GetPolicy => "GetPolicy",
            Operation::ListEntitiesForPolicy => "ListEntitiesForPolicy",
            Operation::DetachGroupPolicy => "DetachGroupPolicy",
            Operation::DetachRolePolicy => "DetachRolePolicy",
            Operation::DetachUserPolicy => "DetachUserPolicy",
            Operation::DeletePolicy => "DeletePolicy",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to create a managed policy.
///
/// `document` is already serialized to the provider's JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePolicyRequest {
    /// Policy name, unique per account
    pub name: String,
    /// IAM path, e.g. "/"
    pub path: String,
    /// Serialized policy document
    pub document: String,
}

/// A managed policy as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name
    pub name: String,
    /// Provider-assigned ARN
    pub arn: String,
    /// IAM path
    pub path: String,
}

/// Entities a policy is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntities {
    /// Attached group names
    pub groups: Vec<String>,
    /// Attached role names
    pub roles: Vec<String>,
    /// Attached user names
    pub users: Vec<String>,
}

impl PolicyEntities {
    /// Names attached for a given kind.
    pub fn of_kind(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Group => &self.groups,
            EntityKind::Role => &self.roles,
            EntityKind::User => &self.users,
        }
    }

    /// Flatten into `(kind, name)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &str)> {
        EntityKind::ALL.into_iter().flat_map(move |kind| {
            self.of_kind(kind)
                .iter()
                .map(move |name| (kind, name.as_str()))
        })
    }

    /// Total number of attachments.
    pub fn len(&self) -> usize {
        self.groups.len() + self.roles.len() + self.users.len()
    }

    /// Whether the policy is attached to nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(20),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Always within `0..=max_delay`, whatever the backoff factor.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        if delay.is_nan() || delay <= 0.0 {
            return Duration::ZERO;
        }
        if delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
