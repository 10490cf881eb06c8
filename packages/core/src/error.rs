//! Error types carried through the injected capabilities.
//!
//! None of these are fatal to a queue or batch: a rejected submission becomes a
//! failed job, and a probe error is retried on the next poll.

use crate::ExternalId;

/// Reason a submission was not accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Submission timed out")]
    Timeout,
}

/// Reason a status probe could not determine a remote job's state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown job: {0}")]
    UnknownJob(ExternalId),
}
