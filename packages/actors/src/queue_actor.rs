//! Queue actor owning a single [`SubmissionQueue`].

use std::sync::Arc;

use chrono::Utc;
use cohort_core::{
    Admission, CancelOperation, EntrySnapshot, EntryStatus, ExternalId, QueueConfig, QueueEvent,
    QueueId, StatusProbe, SubmissionQueue,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{AdmitReply, QueueMessage};
use crate::poller::{PollHandle, PollSchedule, spawn_poller};

/// Buffered queue events per subscriber.
const EVENT_CAPACITY: usize = 256;

/// State for the queue actor.
pub struct QueueActorState {
    pub queue_id: QueueId,
    queue: SubmissionQueue<PollHandle>,
    config: QueueConfig,
    probe: Option<Arc<dyn StatusProbe>>,
    cancel: Option<Arc<dyn CancelOperation>>,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl QueueActorState {
    fn new(args: QueueArgs) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            queue_id: args.queue_id,
            queue: SubmissionQueue::from_config(&args.config),
            config: args.config,
            probe: args.probe,
            cancel: args.cancel,
            event_tx,
        }
    }

    fn broadcast(&self, event: QueueEvent) {
        tracing::trace!("Queue {}: {}", self.queue_id, event.description());
        let _ = self.event_tx.send(event);
    }

    fn admit(&mut self, myself: &ActorRef<QueueMessage>, job_id: ExternalId) -> AdmitReply {
        if self.queue.find_entry(&job_id).is_some() {
            tracing::warn!("Queue {} already tracks {}", self.queue_id, job_id);
        }

        let Admission { entry, evicted } = self.queue.add_submission(job_id.clone());
        let entry = entry.snapshot();
        let evicted = evicted.map(|mut evicted| {
            // Stop polling before anything else touches the remote job.
            drop(evicted.take_poll_handle());

            let mut cancelled = false;
            if evicted.status.is_active()
                && self.config.cancel_evicted
                && let Some(cancel) = &self.cancel
            {
                cancel.cancel(&evicted.job_id);
                evicted.status = EntryStatus::Cancelled;
                cancelled = true;
            }

            tracing::debug!(
                "Queue {} evicted {} ({})",
                self.queue_id,
                evicted.job_id,
                evicted.seq_num
            );
            let snapshot = evicted.snapshot();
            self.broadcast(QueueEvent::Evicted {
                queue_id: self.queue_id,
                entry: snapshot.clone(),
                cancelled,
                timestamp: Utc::now(),
            });
            snapshot
        });

        if let Some(probe) = &self.probe {
            let schedule = PollSchedule {
                interval: self.config.poll_interval(),
                timeout: self.config.poll_timeout(),
            };
            let handle = spawn_poller(job_id.clone(), probe.clone(), myself.clone(), schedule);
            // An unbound handle is dropped here, which stops the task.
            let _ = self.queue.bind_poll_handle(entry.seq_num, handle);
        }

        self.broadcast(QueueEvent::Admitted {
            queue_id: self.queue_id,
            entry: entry.clone(),
            timestamp: Utc::now(),
        });

        AdmitReply { entry, evicted }
    }

    fn update_status(&mut self, job_id: ExternalId, status: EntryStatus) -> bool {
        let Some(old_status) = self.queue.find_entry(&job_id).map(|e| e.status) else {
            return false;
        };
        if old_status == status || !self.queue.update_status(&job_id, status) {
            return false;
        }

        self.broadcast(QueueEvent::StatusChanged {
            queue_id: self.queue_id,
            job_id: job_id.clone(),
            old_status,
            new_status: status,
            timestamp: Utc::now(),
        });

        if status.is_terminal()
            && let Some(entry) = self.queue.find_entry_mut(&job_id)
        {
            drop(entry.take_poll_handle());
        }

        if let Some(entry) = self.queue.find_entry(&job_id)
            && self.queue.should_display(entry)
        {
            tracing::debug!("Queue {} result ready: {}", self.queue_id, job_id);
            self.broadcast(QueueEvent::ResultReady {
                queue_id: self.queue_id,
                job_id,
                seq_num: entry.seq_num,
                timestamp: Utc::now(),
            });
        }

        true
    }

    fn remove(&mut self, job_id: ExternalId) -> Option<EntrySnapshot> {
        let winner = self.queue.displayed().map(|e| e.seq_num);
        // The entry, and with it the poll task, is released after it leaves the queue.
        let removed = self.queue.remove_entry(&job_id)?.snapshot();

        self.broadcast(QueueEvent::Removed {
            queue_id: self.queue_id,
            job_id,
            timestamp: Utc::now(),
        });

        if winner == Some(removed.seq_num)
            && let Some(entry) = self.queue.displayed()
        {
            tracing::debug!("Queue {} result ready: {}", self.queue_id, entry.job_id);
            self.broadcast(QueueEvent::ResultReady {
                queue_id: self.queue_id,
                job_id: entry.job_id.clone(),
                seq_num: entry.seq_num,
                timestamp: Utc::now(),
            });
        }

        Some(removed)
    }
}

/// Queue actor arguments.
pub struct QueueArgs {
    pub queue_id: QueueId,
    pub config: QueueConfig,
    pub probe: Option<Arc<dyn StatusProbe>>,
    pub cancel: Option<Arc<dyn CancelOperation>>,
}

impl QueueArgs {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            queue_id: QueueId::new(),
            config,
            probe: None,
            cancel: None,
        }
    }

    /// Poll admitted submissions with this probe.
    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Cancel evicted submissions with this operation.
    pub fn with_cancel(mut self, cancel: Arc<dyn CancelOperation>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl Default for QueueArgs {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

/// Queue actor that admits submissions and tracks them to completion.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting queue actor: {} (capacity {})",
            args.queue_id,
            args.config.capacity
        );
        Ok(QueueActorState::new(args))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Admit { job_id, reply } => {
                let admitted = state.admit(&myself, job_id);
                let _ = reply.send(admitted);
            }

            QueueMessage::UpdateStatus {
                job_id,
                status,
                reply,
            } => {
                let applied = state.update_status(job_id, status);
                if let Some(reply) = reply {
                    let _ = reply.send(applied);
                }
            }

            QueueMessage::Remove { job_id, reply } => {
                let _ = reply.send(state.remove(job_id));
            }

            QueueMessage::Find { job_id, reply } => {
                let _ = reply.send(state.queue.find_entry(&job_id).map(|e| e.snapshot()));
            }

            QueueMessage::ShouldDisplay { job_id, reply } => {
                let display = state
                    .queue
                    .find_entry(&job_id)
                    .is_some_and(|e| state.queue.should_display(e));
                let _ = reply.send(display);
            }

            QueueMessage::Displayed { reply } => {
                let _ = reply.send(state.queue.displayed().map(|e| e.snapshot()));
            }

            QueueMessage::ActiveCount { reply } => {
                let _ = reply.send(state.queue.active_count());
            }

            QueueMessage::List { reply } => {
                let entries = state.queue.entries().iter().map(|e| e.snapshot()).collect();
                let _ = reply.send(entries);
            }

            QueueMessage::Subscribe { reply } => {
                let _ = reply.send(state.event_tx.subscribe());
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down queue actor: {}", state.queue_id);
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
