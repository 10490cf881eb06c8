//! Bounded submission queue.
//!
//! Tracks at most [`MAX_QUEUE`] in-flight submissions. Admission evicts the
//! oldest entry when full, and [`SubmissionQueue::should_display`] picks the
//! newest completed entry as the one result to surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ExternalId;

/// Default number of submissions tracked at once.
pub const MAX_QUEUE: usize = 3;

/// Unique identifier for a queue instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub Ulid);

impl QueueId {
    /// Create a new unique queue ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Admission sequence number. Total order equals arrival order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeqNum(pub u64);

impl std::fmt::Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status of a queue entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Pending,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl EntryStatus {
    /// Check if the entry is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Cancelled
        )
    }

    /// Pending or polling.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether an entry in this status may move to `next`.
    ///
    /// Terminal statuses are final and nothing moves back to pending.
    pub fn can_become(self, next: EntryStatus) -> bool {
        !self.is_terminal() && (next != EntryStatus::Pending || self == EntryStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Polling => "polling",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tracked submissions.
    pub capacity: usize,
    /// Delay between status probes for an entry (milliseconds).
    pub poll_interval_ms: u64,
    /// Give up on an entry that has not settled after this long (milliseconds).
    pub poll_timeout_ms: u64,
    /// Cancel the remote job of an evicted entry that was still active.
    pub cancel_evicted: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_QUEUE,
            poll_interval_ms: 1_000,
            poll_timeout_ms: 120_000,
            cancel_evicted: true,
        }
    }
}

impl QueueConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// A tracked submission. `H` is the opaque poll resource owned by the entry;
/// it is released when the entry is dropped.
#[derive(Debug)]
pub struct QueueEntry<H = ()> {
    pub job_id: ExternalId,
    pub seq_num: SeqNum,
    pub status: EntryStatus,
    poll_handle: Option<H>,
}

impl<H> QueueEntry<H> {
    fn new(job_id: ExternalId, seq_num: SeqNum) -> Self {
        Self {
            job_id,
            seq_num,
            status: EntryStatus::Polling,
            poll_handle: None,
        }
    }

    pub fn poll_handle(&self) -> Option<&H> {
        self.poll_handle.as_ref()
    }

    /// Detach the poll resource so the caller can release it explicitly.
    pub fn take_poll_handle(&mut self) -> Option<H> {
        self.poll_handle.take()
    }

    /// A plain copy of the entry without its poll resource.
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            job_id: self.job_id.clone(),
            seq_num: self.seq_num,
            status: self.status,
        }
    }
}

/// Serializable view of a [`QueueEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub job_id: ExternalId,
    pub seq_num: SeqNum,
    pub status: EntryStatus,
}

/// Result of [`SubmissionQueue::add_submission`].
#[derive(Debug)]
pub struct Admission<'a, H> {
    /// The newly admitted entry.
    pub entry: &'a QueueEntry<H>,
    /// The oldest entry, if one had to make room.
    pub evicted: Option<QueueEntry<H>>,
}

/// Fixed-capacity, arrival-ordered set of submissions.
#[derive(Debug)]
pub struct SubmissionQueue<H = ()> {
    entries: Vec<QueueEntry<H>>,
    sequence_counter: u64,
    capacity: usize,
}

impl<H> Default for SubmissionQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> SubmissionQueue<H> {
    /// Create an empty queue holding at most [`MAX_QUEUE`] entries.
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE)
    }

    /// Create an empty queue with a custom bound (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.max(1)),
            sequence_counter: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The last sequence number handed out. Never reset.
    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    pub fn entries(&self) -> &[QueueEntry<H>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admit a submission, evicting the entry with the lowest sequence number
    /// if the queue is already full.
    pub fn add_submission(&mut self, job_id: impl Into<ExternalId>) -> Admission<'_, H> {
        self.sequence_counter += 1;
        let entry = QueueEntry::new(job_id.into(), SeqNum(self.sequence_counter));

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.sort_by_key(|e| e.seq_num);
            Some(self.entries.remove(0))
        } else {
            None
        };

        self.entries.push(entry);
        let entry = &self.entries[self.entries.len() - 1];
        Admission { entry, evicted }
    }

    /// True only for a completed entry that no newer completed entry outranks.
    ///
    /// Recomputed on every call: the winner depends on every entry's status.
    pub fn should_display(&self, entry: &QueueEntry<H>) -> bool {
        if entry.status != EntryStatus::Completed {
            return false;
        }
        !self
            .entries
            .iter()
            .any(|e| e.seq_num > entry.seq_num && e.status == EntryStatus::Completed)
    }

    /// The entry currently eligible for display, if any.
    pub fn displayed(&self) -> Option<&QueueEntry<H>> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .max_by_key(|e| e.seq_num)
    }

    /// Remove an entry by id and hand it back.
    ///
    /// The entry still owns its poll resource: the resource is released when
    /// the returned value is dropped, after the entry has left the queue.
    /// Absent ids are a no-op.
    pub fn remove_entry(&mut self, job_id: &ExternalId) -> Option<QueueEntry<H>> {
        let index = self.entries.iter().position(|e| &e.job_id == job_id)?;
        Some(self.entries.remove(index))
    }

    pub fn find_entry(&self, job_id: &ExternalId) -> Option<&QueueEntry<H>> {
        self.entries.iter().find(|e| &e.job_id == job_id)
    }

    pub fn find_entry_mut(&mut self, job_id: &ExternalId) -> Option<&mut QueueEntry<H>> {
        self.entries.iter_mut().find(|e| &e.job_id == job_id)
    }

    /// Count of pending and polling entries.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_active()).count()
    }

    /// Move an entry to a new status.
    ///
    /// Returns false if the id is absent or the move is not allowed (see
    /// [`EntryStatus::can_become`]).
    pub fn update_status(&mut self, job_id: &ExternalId, status: EntryStatus) -> bool {
        match self.find_entry_mut(job_id) {
            Some(entry) if entry.status.can_become(status) => {
                entry.status = status;
                true
            }
            _ => false,
        }
    }

    /// Attach a poll resource to the entry admitted as `seq_num`.
    ///
    /// Gives the handle back if the entry is gone, so the caller can release it.
    /// Replacing an existing handle drops the old one.
    pub fn bind_poll_handle(&mut self, seq_num: SeqNum, handle: H) -> Result<(), H> {
        match self.entries.iter_mut().find(|e| e.seq_num == seq_num) {
            Some(entry) => {
                entry.poll_handle = Some(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }
}
