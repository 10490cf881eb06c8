//! Message types for actor communication.

use std::sync::Arc;

use cohort_core::{
    AllDoneHandler, BatchEvent, BatchJob, BatchSnapshot, CancelOperation, EntrySnapshot,
    EntryStatus, ExternalId, Generation, ProgressHandler, QueueEvent, SubmitError,
    SubmitOperation, SubmitTicket,
};
use ractor::RpcReplyPort;
use tokio::sync::broadcast;

/// Messages for the BatchActor.
pub enum BatchMessage {
    /// Fire `count` jobs through `submit`. Replies with the new pending jobs.
    Fire {
        count: usize,
        submit: Arc<dyn SubmitOperation>,
        reply: RpcReplyPort<Vec<BatchJob>>,
    },

    /// A spawned submission finished.
    SubmissionSettled {
        ticket: SubmitTicket,
        outcome: Result<ExternalId, SubmitError>,
    },

    /// Report remote completion of a submitted job.
    CompleteJob {
        external_id: ExternalId,
        reply: RpcReplyPort<bool>,
    },

    /// Report remote failure of a submitted job.
    FailJob {
        external_id: ExternalId,
        reply: RpcReplyPort<bool>,
    },

    /// Abort the batch. Replies with the new generation.
    Abort {
        cancel: Option<Arc<dyn CancelOperation>>,
        reply: RpcReplyPort<Generation>,
    },

    /// Install or clear the progress callback.
    SetProgressHandler { handler: Option<ProgressHandler> },

    /// Install or clear the completion callback.
    SetAllDoneHandler { handler: Option<AllDoneHandler> },

    /// Get a snapshot of the batch.
    Snapshot { reply: RpcReplyPort<BatchSnapshot> },

    /// Subscribe to batch events.
    Subscribe {
        reply: RpcReplyPort<broadcast::Receiver<BatchEvent>>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Admission result sent back by the QueueActor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmitReply {
    pub entry: EntrySnapshot,
    pub evicted: Option<EntrySnapshot>,
}

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Admit a new submission.
    Admit {
        job_id: ExternalId,
        reply: RpcReplyPort<AdmitReply>,
    },

    /// Move an entry to a new status. Pollers send this without a reply port.
    UpdateStatus {
        job_id: ExternalId,
        status: EntryStatus,
        reply: Option<RpcReplyPort<bool>>,
    },

    /// Remove an entry and release its poll task.
    Remove {
        job_id: ExternalId,
        reply: RpcReplyPort<Option<EntrySnapshot>>,
    },

    /// Look up an entry.
    Find {
        job_id: ExternalId,
        reply: RpcReplyPort<Option<EntrySnapshot>>,
    },

    /// Whether this entry's result is the one to show.
    ShouldDisplay {
        job_id: ExternalId,
        reply: RpcReplyPort<bool>,
    },

    /// The entry whose result is the one to show, if any.
    Displayed {
        reply: RpcReplyPort<Option<EntrySnapshot>>,
    },

    /// Count of pending and polling entries.
    ActiveCount { reply: RpcReplyPort<usize> },

    /// List entries in storage order.
    List {
        reply: RpcReplyPort<Vec<EntrySnapshot>>,
    },

    /// Subscribe to queue events.
    Subscribe {
        reply: RpcReplyPort<broadcast::Receiver<QueueEvent>>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Result type for handle operations.
pub type ActorResult<T> = Result<T, ActorError>;

/// Error type for actor operations.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),

    #[error("Actor stopped before replying")]
    Stopped,

    #[error("Timeout")]
    Timeout,
}
