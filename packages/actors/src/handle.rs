//! Typed handles over the batch and queue actors.
//!
//! Every method is one message to the owning actor, so calls from any number
//! of tasks are serialized by its mailbox.

use std::sync::Arc;
use std::time::Duration;

use cohort_core::{
    AllDoneHandler, BatchConfig, BatchEvent, BatchId, BatchJob, BatchSnapshot, CancelOperation,
    EntrySnapshot, EntryStatus, ExternalId, Generation, ProgressHandler, QueueEvent, QueueId,
    SubmitOperation,
};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::batch_actor::{BatchActor, BatchArgs};
use crate::messages::{ActorError, ActorResult, AdmitReply, BatchMessage, QueueMessage};
use crate::queue_actor::{QueueActor, QueueArgs};

/// How long a handle waits for an actor to reply.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

async fn call<M, T, F>(actor: &ActorRef<M>, build: F) -> ActorResult<T>
where
    M: ractor::Message,
    T: Send + 'static,
    F: FnOnce(RpcReplyPort<T>) -> M,
{
    match ractor::rpc::call(actor, build, Some(CALL_TIMEOUT)).await {
        Ok(CallResult::Success(value)) => Ok(value),
        Ok(CallResult::Timeout) => Err(ActorError::Timeout),
        Ok(CallResult::SenderError) => Err(ActorError::Stopped),
        Err(e) => Err(ActorError::Messaging(e.to_string())),
    }
}

fn cast<M: ractor::Message>(actor: &ActorRef<M>, message: M) -> ActorResult<()> {
    actor
        .send_message(message)
        .map_err(|e| ActorError::Messaging(e.to_string()))
}

/// Handle to a running batch actor.
#[derive(Clone)]
pub struct BatchHandle {
    batch_id: BatchId,
    actor: ActorRef<BatchMessage>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn actor(&self) -> &ActorRef<BatchMessage> {
        &self.actor
    }

    /// Fire `count` jobs. Returns them in pending state, before any
    /// submission has resolved.
    pub async fn fire_jobs(
        &self,
        count: usize,
        submit: Arc<dyn SubmitOperation>,
    ) -> ActorResult<Vec<BatchJob>> {
        call(&self.actor, |reply| BatchMessage::Fire {
            count,
            submit,
            reply,
        })
        .await
    }

    pub async fn complete_job(&self, external_id: impl Into<ExternalId>) -> ActorResult<bool> {
        let external_id = external_id.into();
        call(&self.actor, |reply| BatchMessage::CompleteJob { external_id, reply }).await
    }

    pub async fn fail_job(&self, external_id: impl Into<ExternalId>) -> ActorResult<bool> {
        let external_id = external_id.into();
        call(&self.actor, |reply| BatchMessage::FailJob { external_id, reply }).await
    }

    /// Abort the batch and return the new generation.
    pub async fn abort(
        &self,
        cancel: Option<Arc<dyn CancelOperation>>,
    ) -> ActorResult<Generation> {
        call(&self.actor, |reply| BatchMessage::Abort { cancel, reply }).await
    }

    /// Install the progress callback. It runs on the actor's task and must
    /// not await a call into this batch.
    pub fn set_on_progress(&self, handler: Option<ProgressHandler>) -> ActorResult<()> {
        cast(&self.actor, BatchMessage::SetProgressHandler { handler })
    }

    /// Install the completion callback. Same constraints as `set_on_progress`.
    pub fn set_on_all_done(&self, handler: Option<AllDoneHandler>) -> ActorResult<()> {
        cast(&self.actor, BatchMessage::SetAllDoneHandler { handler })
    }

    pub async fn snapshot(&self) -> ActorResult<BatchSnapshot> {
        call(&self.actor, |reply| BatchMessage::Snapshot { reply }).await
    }

    pub async fn completed_count(&self) -> ActorResult<usize> {
        Ok(self.snapshot().await?.completed)
    }

    pub async fn settled_count(&self) -> ActorResult<usize> {
        Ok(self.snapshot().await?.settled)
    }

    pub async fn all_done(&self) -> ActorResult<bool> {
        Ok(self.snapshot().await?.all_done)
    }

    pub async fn subscribe(&self) -> ActorResult<broadcast::Receiver<BatchEvent>> {
        call(&self.actor, |reply| BatchMessage::Subscribe { reply }).await
    }

    pub fn shutdown(&self) -> ActorResult<()> {
        cast(&self.actor, BatchMessage::Shutdown)
    }
}

/// Handle to a running queue actor.
#[derive(Clone)]
pub struct QueueHandle {
    queue_id: QueueId,
    actor: ActorRef<QueueMessage>,
}

impl QueueHandle {
    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    pub fn actor(&self) -> &ActorRef<QueueMessage> {
        &self.actor
    }

    pub async fn add_submission(&self, job_id: impl Into<ExternalId>) -> ActorResult<AdmitReply> {
        let job_id = job_id.into();
        call(&self.actor, |reply| QueueMessage::Admit { job_id, reply }).await
    }

    /// Report a status change. False if the entry is gone, already terminal,
    /// or already in `status`.
    pub async fn update_status(
        &self,
        job_id: impl Into<ExternalId>,
        status: EntryStatus,
    ) -> ActorResult<bool> {
        let job_id = job_id.into();
        call(&self.actor, |reply| QueueMessage::UpdateStatus {
            job_id,
            status,
            reply: Some(reply),
        })
        .await
    }

    pub async fn remove_entry(
        &self,
        job_id: impl Into<ExternalId>,
    ) -> ActorResult<Option<EntrySnapshot>> {
        let job_id = job_id.into();
        call(&self.actor, |reply| QueueMessage::Remove { job_id, reply }).await
    }

    pub async fn find_entry(
        &self,
        job_id: impl Into<ExternalId>,
    ) -> ActorResult<Option<EntrySnapshot>> {
        let job_id = job_id.into();
        call(&self.actor, |reply| QueueMessage::Find { job_id, reply }).await
    }

    pub async fn should_display(&self, job_id: impl Into<ExternalId>) -> ActorResult<bool> {
        let job_id = job_id.into();
        call(&self.actor, |reply| QueueMessage::ShouldDisplay { job_id, reply }).await
    }

    pub async fn displayed(&self) -> ActorResult<Option<EntrySnapshot>> {
        call(&self.actor, |reply| QueueMessage::Displayed { reply }).await
    }

    pub async fn active_count(&self) -> ActorResult<usize> {
        call(&self.actor, |reply| QueueMessage::ActiveCount { reply }).await
    }

    pub async fn entries(&self) -> ActorResult<Vec<EntrySnapshot>> {
        call(&self.actor, |reply| QueueMessage::List { reply }).await
    }

    pub async fn subscribe(&self) -> ActorResult<broadcast::Receiver<QueueEvent>> {
        call(&self.actor, |reply| QueueMessage::Subscribe { reply }).await
    }

    pub fn shutdown(&self) -> ActorResult<()> {
        cast(&self.actor, QueueMessage::Shutdown)
    }
}

/// Start a batch actor.
pub async fn start_batch(config: BatchConfig) -> ActorResult<(BatchHandle, JoinHandle<()>)> {
    let batch_id = BatchId::new();
    let (actor, handle) = Actor::spawn(
        Some(format!("batch-{}", batch_id)),
        BatchActor,
        BatchArgs { batch_id, config },
    )
    .await
    .map_err(|e| ActorError::Spawn(e.to_string()))?;

    Ok((BatchHandle { batch_id, actor }, handle))
}

/// Start a queue actor.
pub async fn start_queue(args: QueueArgs) -> ActorResult<(QueueHandle, JoinHandle<()>)> {
    let queue_id = args.queue_id;
    let (actor, handle) = Actor::spawn(Some(format!("queue-{}", queue_id)), QueueActor, args)
        .await
        .map_err(|e| ActorError::Spawn(e.to_string()))?;

    Ok((QueueHandle { queue_id, actor }, handle))
}
