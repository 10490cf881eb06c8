//! Actor system for tracking asynchronous submissions.
//!
//! This crate confines each state machine from `cohort_core` to its own
//! Ractor actor, so every mutation is serialized by the actor's mailbox.
//!
//! # Architecture
//!
//! - `BatchActor` - Owns a `JobBatch`; spawns one task per submission and
//!   applies each outcome when it reports back
//! - `QueueActor` - Owns a `SubmissionQueue`; polls admitted entries and
//!   cancels evicted ones
//! - `BatchHandle` / `QueueHandle` - Typed async front ends for callers
//!
//! # Usage
//!
//! ```ignore
//! use cohort_actors::start_batch;
//! use cohort_core::BatchConfig;
//!
//! let (batch, _join) = start_batch(BatchConfig::default()).await?;
//! batch.fire_jobs(4, submit.clone()).await?;
//! batch.complete_job("job-1").await?;
//! ```

mod batch_actor;
mod handle;
mod messages;
mod poller;
mod queue_actor;

pub use batch_actor::{BatchActor, BatchActorState, BatchArgs};
pub use handle::{BatchHandle, QueueHandle, start_batch, start_queue};
pub use messages::{ActorError, ActorResult, AdmitReply, BatchMessage, QueueMessage};
pub use poller::{PollHandle, PollSchedule, spawn_poller};
pub use queue_actor::{QueueActor, QueueActorState, QueueArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
