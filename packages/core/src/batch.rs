//! Generation-scoped job batch.
//!
//! A batch fires a cohort of submissions and tracks each to a terminal state.
//! [`JobBatch::abort`] advances the generation; any submission result captured
//! under an older generation is discarded when it arrives.
//!
//! The batch itself never awaits anything. Firing hands back a
//! [`SubmitTicket`] per job; whoever drives the submissions feeds each outcome
//! back through [`JobBatch::resolve_submission`] from the same context that
//! owns the batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{BatchJob, BatchJobStatus, CancelOperation, ExternalId, SubmitError};

/// Unique identifier for a batch instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Create a new unique batch ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Batch generation. Advanced only by abort.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Configuration for batch actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Generation the batch starts in.
    pub initial_generation: u64,
    /// Buffered events per subscriber before lagging.
    pub event_capacity: usize,
    /// Upper bound on a single submission (milliseconds). `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_timeout_ms: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_generation: 1,
            event_capacity: 1024,
            submit_timeout_ms: None,
        }
    }
}

impl BatchConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }
}

/// Progress callback: `(completed, total)`.
pub type ProgressHandler = Box<dyn FnMut(usize, usize) + Send>;

/// Called when every job of a non-empty batch has settled.
pub type AllDoneHandler = Box<dyn FnMut() + Send>;

/// Identifies one in-flight submission: the job it belongs to and the
/// generation that was current when it was fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmitTicket {
    pub generation: Generation,
    pub job_id: u64,
}

/// Jobs created by one [`JobBatch::fire_jobs`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredJobs {
    pub generation: Generation,
    pub jobs: Vec<BatchJob>,
}

impl FiredJobs {
    /// One ticket per fired job, in firing order.
    pub fn tickets(&self) -> impl Iterator<Item = SubmitTicket> + '_ {
        self.jobs.iter().map(|job| SubmitTicket {
            generation: self.generation,
            job_id: job.id,
        })
    }
}

/// Point-in-time view of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub generation: Generation,
    pub total_fired: u64,
    pub jobs: Vec<BatchJob>,
    pub completed: usize,
    pub settled: usize,
    pub all_done: bool,
}

/// A cohort of jobs fired together under one generation.
pub struct JobBatch {
    generation: Generation,
    jobs: Vec<BatchJob>,
    total_fired: u64,
    on_progress: Option<ProgressHandler>,
    on_all_done: Option<AllDoneHandler>,
}

impl std::fmt::Debug for JobBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBatch")
            .field("generation", &self.generation)
            .field("jobs", &self.jobs)
            .field("total_fired", &self.total_fired)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_all_done", &self.on_all_done.is_some())
            .finish()
    }
}

impl JobBatch {
    /// Create an empty batch in the given generation.
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            jobs: Vec::new(),
            total_fired: 0,
            on_progress: None,
            on_all_done: None,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(Generation(config.initial_generation))
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn jobs(&self) -> &[BatchJob] {
        &self.jobs
    }

    /// Jobs fired in the current generation, including extensions.
    pub fn total_fired(&self) -> u64 {
        self.total_fired
    }

    /// Install the progress callback, replacing any previous one.
    ///
    /// Callbacks run synchronously inside the mutating call. They must not
    /// block, and must not re-enter the batch's owner.
    pub fn set_on_progress(&mut self, handler: Option<ProgressHandler>) {
        self.on_progress = handler;
    }

    /// Install the completion callback, replacing any previous one.
    pub fn set_on_all_done(&mut self, handler: Option<AllDoneHandler>) {
        self.on_all_done = handler;
    }

    /// Create `count` pending jobs with ids continuing from `total_fired`.
    ///
    /// The caller starts one submission per returned ticket and reports each
    /// outcome through [`resolve_submission`](Self::resolve_submission).
    pub fn fire_jobs(&mut self, count: usize) -> FiredJobs {
        let start = self.total_fired;
        let jobs: Vec<BatchJob> = (0..count as u64).map(|i| BatchJob::new(start + i)).collect();
        self.jobs.extend(jobs.iter().cloned());
        self.total_fired += count as u64;
        FiredJobs {
            generation: self.generation,
            jobs,
        }
    }

    /// Apply the outcome of a submission.
    ///
    /// A ticket from an older generation is discarded without touching any
    /// state. Otherwise the job is matched by id and must still be pending.
    /// Returns whether a transition was applied.
    pub fn resolve_submission(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<ExternalId, SubmitError>,
    ) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        let Some(job) = self
            .jobs
            .iter_mut()
            .find(|j| j.id == ticket.job_id && j.status == BatchJobStatus::Pending)
        else {
            return false;
        };

        match outcome {
            Ok(external_id) => {
                job.external_id = Some(external_id);
                job.status = BatchJobStatus::Submitted;
            }
            Err(_) => {
                job.status = BatchJobStatus::Failed;
            }
        }
        self.emit_progress();
        true
    }

    /// Mark a submitted job completed. False if no submitted job has this id.
    pub fn complete_job(&mut self, external_id: &ExternalId) -> bool {
        self.settle(external_id, BatchJobStatus::Completed)
    }

    /// Mark a submitted job failed. False if no submitted job has this id.
    pub fn fail_job(&mut self, external_id: &ExternalId) -> bool {
        self.settle(external_id, BatchJobStatus::Failed)
    }

    fn settle(&mut self, external_id: &ExternalId, status: BatchJobStatus) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|j| j.is_submitted_as(external_id)) else {
            return false;
        };
        job.status = status;
        self.emit_progress();
        true
    }

    /// Hard reset: advance the generation, cancel every active job that has an
    /// external id, then drop all jobs.
    ///
    /// Pending jobs without an external id cannot be cancelled and are simply
    /// dropped; their submissions resolve later as stale. Returns the external
    /// ids that were handed to `cancel`.
    pub fn abort(&mut self, cancel: Option<&dyn CancelOperation>) -> Vec<ExternalId> {
        self.generation = self.generation.next();

        let mut cancelled = Vec::new();
        if let Some(cancel) = cancel {
            for job in &self.jobs {
                if !job.status.is_active() {
                    continue;
                }
                if let Some(external_id) = &job.external_id {
                    cancel.cancel(external_id);
                    cancelled.push(external_id.clone());
                }
            }
        }

        self.jobs.clear();
        self.total_fired = 0;
        cancelled
    }

    pub fn completed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == BatchJobStatus::Completed)
            .count()
    }

    /// Completed plus failed.
    pub fn settled_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_terminal()).count()
    }

    /// Every job settled. An empty batch is never done.
    pub fn all_done(&self) -> bool {
        !self.jobs.is_empty() && self.settled_count() == self.jobs.len()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            generation: self.generation,
            total_fired: self.total_fired,
            jobs: self.jobs.clone(),
            completed: self.completed_count(),
            settled: self.settled_count(),
            all_done: self.all_done(),
        }
    }

    fn emit_progress(&mut self) {
        let completed = self.completed_count();
        let total = self.jobs.len();
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(completed, total);
        }
        if self.all_done()
            && let Some(on_all_done) = self.on_all_done.as_mut()
        {
            on_all_done();
        }
    }
}
