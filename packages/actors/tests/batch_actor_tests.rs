#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cohort_actors::start_batch;
use cohort_core::{
    BatchConfig, BatchEvent, BatchJobStatus, BatchSnapshot, ExternalId, Generation,
};

use common::{
    GatedSubmit, counting_submit, init_tracing, recording_cancel, rejecting_submit, settle,
    wait_for_batch,
};

fn all_with(status: BatchJobStatus) -> impl Fn(&BatchSnapshot) -> bool {
    move |s: &BatchSnapshot| !s.jobs.is_empty() && s.jobs.iter().all(|j| j.status == status)
}

#[tokio::test]
async fn starts_empty_in_configured_generation() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();

    let snapshot = batch.snapshot().await.unwrap();
    assert_eq!(snapshot.generation, Generation(1));
    assert!(snapshot.jobs.is_empty());
    assert_eq!(snapshot.total_fired, 0);
    assert!(!batch.all_done().await.unwrap());
}

#[tokio::test]
async fn fire_returns_pending_jobs_then_submits() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let (submit, calls) = counting_submit("ext");

    let jobs = batch.fire_jobs(4, submit).await.unwrap();
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|j| j.status == BatchJobStatus::Pending));
    assert_eq!(jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let snapshot = wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    assert_eq!(snapshot.total_fired, 4);
    assert_eq!(snapshot.jobs[0].external_id, Some(ExternalId::from("ext-1")));
    assert_eq!(snapshot.jobs[3].external_id, Some(ExternalId::from("ext-4")));
}

#[tokio::test]
async fn rejected_submissions_fail_jobs() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let done = Arc::new(Mutex::new(0));
    let sink = done.clone();
    batch
        .set_on_all_done(Some(Box::new(move || *sink.lock().unwrap() += 1)))
        .unwrap();

    batch.fire_jobs(2, rejecting_submit()).await.unwrap();

    let snapshot = wait_for_batch(&batch, all_with(BatchJobStatus::Failed)).await;
    assert_eq!(snapshot.settled, 2);
    assert!(snapshot.all_done);
    assert_eq!(*done.lock().unwrap(), 1);
}

#[tokio::test]
async fn slow_submissions_time_out() {
    init_tracing();
    let config = BatchConfig {
        submit_timeout_ms: Some(20),
        ..Default::default()
    };
    let (batch, _join) = start_batch(config).await.unwrap();
    let gate = GatedSubmit::default();

    batch.fire_jobs(2, gate.operation()).await.unwrap();
    let snapshot = wait_for_batch(&batch, all_with(BatchJobStatus::Failed)).await;
    assert!(snapshot.all_done);
    assert_eq!(gate.pending(), 2);
}

#[tokio::test]
async fn complete_and_fail_require_submitted_jobs() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let (submit, _) = counting_submit("j");

    assert!(!batch.complete_job("j-1").await.unwrap());

    batch.fire_jobs(2, submit).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;

    assert!(batch.complete_job("j-1").await.unwrap());
    assert!(!batch.complete_job("j-1").await.unwrap());
    assert!(!batch.fail_job("j-1").await.unwrap());
    assert_eq!(batch.completed_count().await.unwrap(), 1);

    assert!(!batch.fail_job("unknown").await.unwrap());
    assert!(batch.fail_job("j-2").await.unwrap());
    assert_eq!(batch.settled_count().await.unwrap(), 2);
    assert!(batch.all_done().await.unwrap());
}

#[tokio::test]
async fn progress_and_completion_notifications() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let progress_sink = calls.clone();
    batch
        .set_on_progress(Some(Box::new(move |c, t| {
            progress_sink.lock().unwrap().push((c, t))
        })))
        .unwrap();
    let done = Arc::new(Mutex::new(0));
    let done_sink = done.clone();
    batch
        .set_on_all_done(Some(Box::new(move || *done_sink.lock().unwrap() += 1)))
        .unwrap();

    let (submit, _) = counting_submit("j");
    batch.fire_jobs(3, submit).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    assert_eq!(*calls.lock().unwrap(), vec![(0, 3), (0, 3), (0, 3)]);

    batch.complete_job("j-1").await.unwrap();
    assert_eq!(calls.lock().unwrap().last(), Some(&(1, 3)));
    batch.complete_job("j-2").await.unwrap();
    assert_eq!(calls.lock().unwrap().last(), Some(&(2, 3)));
    assert_eq!(*done.lock().unwrap(), 0);

    batch.complete_job("j-3").await.unwrap();
    assert_eq!(calls.lock().unwrap().last(), Some(&(3, 3)));
    assert_eq!(calls.lock().unwrap().len(), 6);
    assert_eq!(*done.lock().unwrap(), 1);
}

#[tokio::test]
async fn all_done_fires_once_per_generation() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let done = Arc::new(Mutex::new(0));
    let sink = done.clone();
    batch
        .set_on_all_done(Some(Box::new(move || *sink.lock().unwrap() += 1)))
        .unwrap();

    let (submit, _) = counting_submit("j");
    batch.fire_jobs(2, submit.clone()).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    batch.complete_job("j-1").await.unwrap();
    batch.fail_job("j-2").await.unwrap();
    assert_eq!(*done.lock().unwrap(), 1);

    batch.abort(None).await.unwrap();
    batch.fire_jobs(1, submit).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    batch.complete_job("j-3").await.unwrap();
    assert_eq!(*done.lock().unwrap(), 2);
}

#[tokio::test]
async fn abort_cancels_submitted_jobs() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let (submit, _) = counting_submit("j");
    batch.fire_jobs(3, submit).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;

    let (cancel, cancelled) = recording_cancel();
    let generation = batch.abort(Some(cancel)).await.unwrap();
    assert_eq!(generation, Generation(2));

    let snapshot = batch.snapshot().await.unwrap();
    assert_eq!(snapshot.generation, Generation(2));
    assert!(snapshot.jobs.is_empty());
    assert_eq!(snapshot.total_fired, 0);

    let mut ids = cancelled.lock().unwrap().clone();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            ExternalId::from("j-1"),
            ExternalId::from("j-2"),
            ExternalId::from("j-3")
        ]
    );
}

#[tokio::test]
async fn submissions_resolving_after_abort_are_ignored() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    batch
        .set_on_progress(Some(Box::new(move |c, t| sink.lock().unwrap().push((c, t)))))
        .unwrap();

    let gate = GatedSubmit::default();
    batch.fire_jobs(2, gate.operation()).await.unwrap();
    assert_eq!(gate.pending(), 2);

    let (cancel, cancelled) = recording_cancel();
    batch.abort(Some(cancel)).await.unwrap();
    // Pending jobs have no external id yet, so nothing can be cancelled.
    assert!(cancelled.lock().unwrap().is_empty());

    gate.resolve_all("old");
    settle().await;

    let snapshot = batch.snapshot().await.unwrap();
    assert_eq!(snapshot.generation, Generation(2));
    assert!(snapshot.jobs.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stale_results_leave_refired_jobs_alone() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let old_gate = GatedSubmit::default();
    let new_gate = GatedSubmit::default();

    batch.fire_jobs(2, old_gate.operation()).await.unwrap();
    batch.abort(None).await.unwrap();
    let refired = batch.fire_jobs(2, new_gate.operation()).await.unwrap();
    assert_eq!(refired.iter().map(|j| j.id).collect::<Vec<_>>(), vec![0, 1]);

    old_gate.resolve_all("old");
    settle().await;
    let snapshot = batch.snapshot().await.unwrap();
    assert!(snapshot.jobs.iter().all(|j| j.status == BatchJobStatus::Pending));
    assert!(snapshot.jobs.iter().all(|j| j.external_id.is_none()));

    new_gate.resolve_all("new");
    let snapshot = wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    let mut ids: Vec<_> = snapshot
        .jobs
        .iter()
        .filter_map(|j| j.external_id.clone())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![ExternalId::from("new-0"), ExternalId::from("new-1")]);
}

#[tokio::test]
async fn fire_extends_existing_batch() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let (submit, _) = counting_submit("j");

    batch.fire_jobs(3, submit.clone()).await.unwrap();
    let extension = batch.fire_jobs(2, submit).await.unwrap();
    assert_eq!(extension.iter().map(|j| j.id).collect::<Vec<_>>(), vec![3, 4]);

    let snapshot = wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;
    assert_eq!(snapshot.total_fired, 5);
    assert_eq!(snapshot.jobs.len(), 5);
    assert_eq!(snapshot.jobs[3].external_id, Some(ExternalId::from("j-4")));
    assert_eq!(snapshot.jobs[4].external_id, Some(ExternalId::from("j-5")));
}

#[tokio::test]
async fn concurrent_completions_apply_once() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let (submit, _) = counting_submit("j");
    batch.fire_jobs(1, submit).await.unwrap();
    wait_for_batch(&batch, all_with(BatchJobStatus::Submitted)).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let batch = batch.clone();
        tasks.push(tokio::spawn(async move { batch.complete_job("j-1").await }));
    }
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(batch.completed_count().await.unwrap(), 1);
}

#[tokio::test]
async fn events_follow_accepted_transitions() {
    init_tracing();
    let (batch, _join) = start_batch(BatchConfig::default()).await.unwrap();
    let mut events = batch.subscribe().await.unwrap();
    let (submit, _) = counting_submit("j");

    batch.fire_jobs(1, submit).await.unwrap();
    let fired = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(fired, BatchEvent::Fired { ref job_ids, .. } if job_ids == &vec![0]));

    let submitted = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        submitted,
        BatchEvent::JobTransitioned {
            job_id: 0,
            status: BatchJobStatus::Submitted,
            completed: 0,
            total: 1,
            ..
        }
    ));

    batch.complete_job("j-1").await.unwrap();
    let completed = events.recv().await.unwrap();
    assert!(matches!(
        completed,
        BatchEvent::JobTransitioned {
            status: BatchJobStatus::Completed,
            ..
        }
    ));
    let all_done = events.recv().await.unwrap();
    assert!(matches!(all_done, BatchEvent::AllDone { completed: 1, total: 1, .. }));

    batch.abort(None).await.unwrap();
    let aborted = events.recv().await.unwrap();
    assert_eq!(aborted.generation(), Generation(2));
}

#[tokio::test]
async fn shutdown_stops_the_actor() {
    init_tracing();
    let (batch, join) = start_batch(BatchConfig::default()).await.unwrap();
    batch.shutdown().unwrap();
    tokio::time::timeout(Duration::from_secs(2), join)
        .await
        .unwrap()
        .unwrap();
    assert!(batch.snapshot().await.is_err());
}
