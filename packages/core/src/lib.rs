//! Core state machines for tracking asynchronous submissions.
//!
//! This crate contains the runtime-free pieces shared by every consumer:
//! - `SubmissionQueue`, a bounded queue that decides which result to surface
//! - `JobBatch`, a generation-scoped cohort of fired jobs
//! - Capability traits for the submit, cancel and probe operations
//! - Events for real-time updates

mod batch;
mod error;
mod events;
mod job;
mod ops;
mod queue;

pub use batch::{
    AllDoneHandler, BatchConfig, BatchId, BatchSnapshot, FiredJobs, Generation, JobBatch,
    ProgressHandler, SubmitTicket,
};
pub use error::{ProbeError, SubmitError};
pub use events::{BatchEvent, QueueEvent};
pub use job::{BatchJob, BatchJobStatus, ExternalId};
pub use ops::{
    CancelOperation, FnCancel, FnProbe, FnSubmit, ProbeFuture, StatusProbe, SubmitFuture,
    SubmitOperation,
};
pub use queue::{
    Admission, EntrySnapshot, EntryStatus, MAX_QUEUE, QueueConfig, QueueEntry, QueueId, SeqNum,
    SubmissionQueue,
};
