//! Event types for real-time updates.
//!
//! Events describe accepted transitions only. A stale submission result never
//! produces one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    BatchId, BatchJobStatus, EntrySnapshot, EntryStatus, ExternalId, Generation, QueueId, SeqNum,
};

/// Events emitted by a submission queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A submission was admitted.
    Admitted {
        queue_id: QueueId,
        entry: EntrySnapshot,
        timestamp: DateTime<Utc>,
    },
    /// The oldest submission was pushed out to make room.
    Evicted {
        queue_id: QueueId,
        entry: EntrySnapshot,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
    /// An entry changed status.
    StatusChanged {
        queue_id: QueueId,
        job_id: ExternalId,
        old_status: EntryStatus,
        new_status: EntryStatus,
        timestamp: DateTime<Utc>,
    },
    /// An entry became the result to display.
    ResultReady {
        queue_id: QueueId,
        job_id: ExternalId,
        seq_num: SeqNum,
        timestamp: DateTime<Utc>,
    },
    /// An entry was removed by the caller.
    Removed {
        queue_id: QueueId,
        job_id: ExternalId,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            QueueEvent::Admitted { timestamp, .. } => *timestamp,
            QueueEvent::Evicted { timestamp, .. } => *timestamp,
            QueueEvent::StatusChanged { timestamp, .. } => *timestamp,
            QueueEvent::ResultReady { timestamp, .. } => *timestamp,
            QueueEvent::Removed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event.
    pub fn job_id(&self) -> &ExternalId {
        match self {
            QueueEvent::Admitted { entry, .. } => &entry.job_id,
            QueueEvent::Evicted { entry, .. } => &entry.job_id,
            QueueEvent::StatusChanged { job_id, .. } => job_id,
            QueueEvent::ResultReady { job_id, .. } => job_id,
            QueueEvent::Removed { job_id, .. } => job_id,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            QueueEvent::Admitted { entry, .. } => {
                format!("Submission {} admitted as {}", entry.job_id, entry.seq_num)
            }
            QueueEvent::Evicted {
                entry, cancelled, ..
            } => {
                let cancelled = if *cancelled { " (cancelled)" } else { "" };
                format!("Submission {} evicted{}", entry.job_id, cancelled)
            }
            QueueEvent::StatusChanged {
                job_id, new_status, ..
            } => format!("Submission {} -> {}", job_id, new_status),
            QueueEvent::ResultReady {
                job_id, seq_num, ..
            } => format!("Result ready for {} ({})", job_id, seq_num),
            QueueEvent::Removed { job_id, .. } => format!("Submission {} removed", job_id),
        }
    }
}

/// Events emitted by a job batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Jobs were fired.
    Fired {
        batch_id: BatchId,
        generation: Generation,
        job_ids: Vec<u64>,
        timestamp: DateTime<Utc>,
    },
    /// A job changed status.
    JobTransitioned {
        batch_id: BatchId,
        generation: Generation,
        job_id: u64,
        status: BatchJobStatus,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },
    /// Every job in the batch has settled.
    AllDone {
        batch_id: BatchId,
        generation: Generation,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },
    /// The batch was aborted and moved to a new generation.
    Aborted {
        batch_id: BatchId,
        old_generation: Generation,
        new_generation: Generation,
        cancelled: Vec<ExternalId>,
        timestamp: DateTime<Utc>,
    },
}

impl BatchEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::Fired { timestamp, .. } => *timestamp,
            BatchEvent::JobTransitioned { timestamp, .. } => *timestamp,
            BatchEvent::AllDone { timestamp, .. } => *timestamp,
            BatchEvent::Aborted { timestamp, .. } => *timestamp,
        }
    }

    /// Generation the event belongs to. Aborts report the new generation.
    pub fn generation(&self) -> Generation {
        match self {
            BatchEvent::Fired { generation, .. } => *generation,
            BatchEvent::JobTransitioned { generation, .. } => *generation,
            BatchEvent::AllDone { generation, .. } => *generation,
            BatchEvent::Aborted { new_generation, .. } => *new_generation,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            BatchEvent::Fired {
                generation,
                job_ids,
                ..
            } => format!("Fired {} jobs in {}", job_ids.len(), generation),
            BatchEvent::JobTransitioned {
                job_id,
                status,
                completed,
                total,
                ..
            } => format!("Job {} -> {} ({}/{})", job_id, status, completed, total),
            BatchEvent::AllDone {
                completed, total, ..
            } => format!("Batch done: {}/{} completed", completed, total),
            BatchEvent::Aborted {
                old_generation,
                new_generation,
                cancelled,
                ..
            } => format!(
                "Batch aborted {} -> {}, {} cancelled",
                old_generation,
                new_generation,
                cancelled.len()
            ),
        }
    }
}
