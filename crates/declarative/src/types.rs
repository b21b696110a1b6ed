//! Core types for component lifecycle management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier assigned once per logical instance by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an orchestrator-assigned id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Display record returned by `info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// Result of reconciling one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Inputs matched the previous pass; nothing was called
    Unchanged,
    /// A new remote resource was created
    Created,
    /// The previous remote resource was removed and a new one created
    Replaced,
    /// The remote resource was removed
    Removed,
}

impl Outcome {
    /// Check if the outcome represents a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Replaced => "replaced",
            Self::Removed => "removed",
        };
        f.write_str(label)
    }
}

/// Tally of outcomes over several reconcile passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub replaced: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.replaced + self.removed
    }

    /// Check if every pass succeeded
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of passes recorded
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.created += other.created;
        self.replaced += other.replaced;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }

    /// Record the result of one pass
    pub fn record<E>(&mut self, result: &Result<Outcome, E>) {
        match result {
            Ok(Outcome::Created) => self.created += 1,
            Ok(Outcome::Replaced) => self.replaced += 1,
            Ok(Outcome::Removed) => self.removed += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Err(_) => self.failed += 1,
        }
    }
}
