//! Job domain types for work items fired in a batch.

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the remote service once a submission resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current status of a batch job in its lifecycle.
///
/// `Pending -> Submitted -> {Completed | Failed}`, or `Pending -> Failed` when
/// the submission itself is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchJobStatus {
    /// Submission is in flight; no external id yet.
    #[default]
    Pending,
    /// The remote service accepted the job.
    Submitted,
    /// The remote service reported success.
    Completed,
    /// Submission was rejected or the remote service reported failure.
    Failed,
}

impl BatchJobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchJobStatus::Completed | BatchJobStatus::Failed)
    }

    /// Jobs still waiting on the remote side.
    pub fn is_active(self) -> bool {
        matches!(self, BatchJobStatus::Pending | BatchJobStatus::Submitted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchJobStatus::Pending => "pending",
            BatchJobStatus::Submitted => "submitted",
            BatchJobStatus::Completed => "completed",
            BatchJobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BatchJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single job owned by a [`JobBatch`](crate::JobBatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Local identity, unique within the current generation's firing history.
    pub id: u64,
    /// Set once the submission resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<ExternalId>,
    /// Current status.
    pub status: BatchJobStatus,
}

impl BatchJob {
    /// Create a new pending job.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            external_id: None,
            status: BatchJobStatus::Pending,
        }
    }

    /// Whether the job is waiting on remote completion under this external id.
    pub fn is_submitted_as(&self, external_id: &ExternalId) -> bool {
        self.status == BatchJobStatus::Submitted && self.external_id.as_ref() == Some(external_id)
    }
}
