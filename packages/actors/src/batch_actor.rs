//! Batch actor owning a single [`JobBatch`].
//!
//! The actor's mailbox is the serialization point for every mutation: the
//! generation check on a settled submission and the abort that advances the
//! generation can never interleave.

use chrono::Utc;
use cohort_core::{BatchConfig, BatchEvent, BatchId, JobBatch, SubmitError};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::BatchMessage;

/// State for the batch actor.
pub struct BatchActorState {
    pub batch_id: BatchId,
    batch: JobBatch,
    config: BatchConfig,
    event_tx: broadcast::Sender<BatchEvent>,
}

impl BatchActorState {
    /// Create a new batch actor state.
    pub fn new(batch_id: BatchId, config: BatchConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            batch_id,
            batch: JobBatch::from_config(&config),
            config,
            event_tx,
        }
    }

    fn broadcast(&self, event: BatchEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Publish the transition of `job_id`, plus completion if it settled the batch.
    fn transitioned(&self, job_id: u64) {
        let Some(job) = self.batch.jobs().iter().find(|j| j.id == job_id) else {
            return;
        };
        let generation = self.batch.generation();
        let completed = self.batch.completed_count();
        let total = self.batch.jobs().len();
        let now = Utc::now();

        tracing::debug!(
            "Batch {} job {} -> {} ({}/{})",
            self.batch_id,
            job_id,
            job.status,
            completed,
            total
        );
        self.broadcast(BatchEvent::JobTransitioned {
            batch_id: self.batch_id,
            generation,
            job_id,
            status: job.status,
            completed,
            total,
            timestamp: now,
        });

        if self.batch.all_done() {
            tracing::info!(
                "Batch {} done in {}: {}/{} completed",
                self.batch_id,
                generation,
                completed,
                total
            );
            self.broadcast(BatchEvent::AllDone {
                batch_id: self.batch_id,
                generation,
                completed,
                total,
                timestamp: now,
            });
        }
    }
}

/// Actor arguments.
pub struct BatchArgs {
    pub batch_id: BatchId,
    pub config: BatchConfig,
}

/// Batch actor that fires and tracks a cohort of jobs.
pub struct BatchActor;

impl Actor for BatchActor {
    type Msg = BatchMessage;
    type State = BatchActorState;
    type Arguments = BatchArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting batch actor: {}", args.batch_id);
        Ok(BatchActorState::new(args.batch_id, args.config))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            BatchMessage::Fire {
                count,
                submit,
                reply,
            } => {
                let fired = state.batch.fire_jobs(count);
                let timeout = state.config.submit_timeout();

                for ticket in fired.tickets() {
                    let submission = submit.submit();
                    let myself = myself.clone();
                    tokio::spawn(async move {
                        let outcome = match timeout {
                            Some(limit) => tokio::time::timeout(limit, submission)
                                .await
                                .unwrap_or(Err(SubmitError::Timeout)),
                            None => submission.await,
                        };
                        // The actor may already be gone; nothing left to update then.
                        let _ =
                            myself.send_message(BatchMessage::SubmissionSettled { ticket, outcome });
                    });
                }

                tracing::info!(
                    "Batch {} fired {} jobs in {} (total {})",
                    state.batch_id,
                    count,
                    fired.generation,
                    state.batch.total_fired()
                );
                state.broadcast(BatchEvent::Fired {
                    batch_id: state.batch_id,
                    generation: fired.generation,
                    job_ids: fired.jobs.iter().map(|j| j.id).collect(),
                    timestamp: Utc::now(),
                });

                let _ = reply.send(fired.jobs);
            }

            BatchMessage::SubmissionSettled { ticket, outcome } => {
                if let Err(ref e) = outcome
                    && ticket.generation == state.batch.generation()
                {
                    tracing::debug!(
                        "Batch {} job {} submission failed: {}",
                        state.batch_id,
                        ticket.job_id,
                        e
                    );
                }
                if state.batch.resolve_submission(ticket, outcome) {
                    state.transitioned(ticket.job_id);
                }
            }

            BatchMessage::CompleteJob { external_id, reply } => {
                let job_id = state
                    .batch
                    .jobs()
                    .iter()
                    .find(|j| j.is_submitted_as(&external_id))
                    .map(|j| j.id);
                let applied = state.batch.complete_job(&external_id);
                if applied && let Some(job_id) = job_id {
                    state.transitioned(job_id);
                }
                let _ = reply.send(applied);
            }

            BatchMessage::FailJob { external_id, reply } => {
                let job_id = state
                    .batch
                    .jobs()
                    .iter()
                    .find(|j| j.is_submitted_as(&external_id))
                    .map(|j| j.id);
                let applied = state.batch.fail_job(&external_id);
                if applied && let Some(job_id) = job_id {
                    state.transitioned(job_id);
                }
                let _ = reply.send(applied);
            }

            BatchMessage::Abort { cancel, reply } => {
                let old_generation = state.batch.generation();
                let dropped = state.batch.jobs().len();
                let cancelled = state.batch.abort(cancel.as_deref());
                let new_generation = state.batch.generation();

                tracing::info!(
                    "Batch {} aborted {} -> {}: dropped {} jobs, cancelled {}",
                    state.batch_id,
                    old_generation,
                    new_generation,
                    dropped,
                    cancelled.len()
                );
                state.broadcast(BatchEvent::Aborted {
                    batch_id: state.batch_id,
                    old_generation,
                    new_generation,
                    cancelled,
                    timestamp: Utc::now(),
                });

                let _ = reply.send(new_generation);
            }

            BatchMessage::SetProgressHandler { handler } => {
                state.batch.set_on_progress(handler);
            }

            BatchMessage::SetAllDoneHandler { handler } => {
                state.batch.set_on_all_done(handler);
            }

            BatchMessage::Snapshot { reply } => {
                let _ = reply.send(state.batch.snapshot());
            }

            BatchMessage::Subscribe { reply } => {
                let _ = reply.send(state.event_tx.subscribe());
            }

            BatchMessage::Shutdown => {
                tracing::info!("Shutting down batch actor: {}", state.batch_id);
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
