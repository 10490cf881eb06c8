//! Status polling for admitted submissions.

use std::sync::Arc;
use std::time::Duration;

use cohort_core::{EntryStatus, ExternalId, StatusProbe};
use ractor::ActorRef;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::messages::QueueMessage;

/// Owns a running poll task. Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollHandle {
    task: AbortHandle,
}

impl PollHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polling cadence for one entry.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Spawn a task that probes `job_id` every `schedule.interval` and reports
/// status changes to the queue actor.
///
/// Stops after a terminal status, after the queue actor goes away, or once
/// `schedule.timeout` has passed, in which case the entry is reported failed.
pub fn spawn_poller(
    job_id: ExternalId,
    probe: Arc<dyn StatusProbe>,
    queue: ActorRef<QueueMessage>,
    schedule: PollSchedule,
) -> PollHandle {
    let task = tokio::spawn(async move {
        let deadline = Instant::now() + schedule.timeout;
        let mut last = EntryStatus::Polling;

        loop {
            tokio::time::sleep(schedule.interval).await;

            // A probe that never answers still ends at the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probed = if remaining.is_zero() {
                None
            } else {
                tokio::time::timeout(remaining, probe.probe(&job_id))
                    .await
                    .ok()
            };

            match probed {
                None => {
                    tracing::warn!("Polling {} timed out after {:?}", job_id, schedule.timeout);
                    let _ = queue.send_message(QueueMessage::UpdateStatus {
                        job_id,
                        status: EntryStatus::Failed,
                        reply: None,
                    });
                    break;
                }
                Some(Ok(status)) => {
                    if status != last {
                        last = status;
                        let report = QueueMessage::UpdateStatus {
                            job_id: job_id.clone(),
                            status,
                            reply: None,
                        };
                        if queue.send_message(report).is_err() {
                            break;
                        }
                    }
                    if status.is_terminal() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Status probe for {} failed: {}", job_id, e);
                }
            }
        }
    });

    PollHandle {
        task: task.abort_handle(),
    }
}
