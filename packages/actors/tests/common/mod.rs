#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cohort_actors::BatchHandle;
use cohort_core::{
    BatchSnapshot, CancelOperation, ExternalId, FnCancel, FnSubmit, SubmitError, SubmitFuture,
    SubmitOperation,
};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Submissions that resolve immediately as `{prefix}-1`, `{prefix}-2`, ...
pub fn counting_submit(prefix: &str) -> (Arc<dyn SubmitOperation>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let prefix = prefix.to_string();
    let submit = FnSubmit::new(move || -> SubmitFuture {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ExternalId::new(format!("{}-{}", prefix, n));
        Box::pin(async move { Ok(id) })
    });
    (Arc::new(submit), calls)
}

/// Submissions that always reject.
pub fn rejecting_submit() -> Arc<dyn SubmitOperation> {
    Arc::new(FnSubmit::new(|| -> SubmitFuture {
        Box::pin(async { Err(SubmitError::Transport("network error".into())) })
    }))
}

/// Submissions that stay in flight until the test resolves them.
#[derive(Clone, Default)]
pub struct GatedSubmit {
    senders: Arc<Mutex<Vec<oneshot::Sender<Result<ExternalId, SubmitError>>>>>,
}

impl GatedSubmit {
    pub fn operation(&self) -> Arc<dyn SubmitOperation> {
        let senders = self.senders.clone();
        Arc::new(FnSubmit::new(move || -> SubmitFuture {
            let (tx, rx) = oneshot::channel();
            senders.lock().unwrap().push(tx);
            Box::pin(async move {
                rx.await
                    .unwrap_or(Err(SubmitError::Rejected("gate dropped".into())))
            })
        }))
    }

    pub fn pending(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Resolve every outstanding submission as `{prefix}-{index}`.
    pub fn resolve_all(&self, prefix: &str) {
        let senders: Vec<_> = self.senders.lock().unwrap().drain(..).collect();
        for (i, tx) in senders.into_iter().enumerate() {
            let _ = tx.send(Ok(ExternalId::new(format!("{}-{}", prefix, i))));
        }
    }
}

/// Records every id handed to the cancel operation.
pub fn recording_cancel() -> (Arc<dyn CancelOperation>, Arc<Mutex<Vec<ExternalId>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let cancel = FnCancel::new(move |id: &ExternalId| sink.lock().unwrap().push(id.clone()));
    (Arc::new(cancel), seen)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Wait until the batch snapshot satisfies `pred` and return it.
pub async fn wait_for_batch<P>(batch: &BatchHandle, pred: P) -> BatchSnapshot
where
    P: Fn(&BatchSnapshot) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = batch.snapshot().await.unwrap();
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    waited.expect("batch did not reach expected state in time")
}

/// Give spawned submission tasks a chance to report back.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
