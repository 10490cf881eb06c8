//! Capabilities injected by the caller: submit, cancel and probe.
//!
//! The core never performs I/O itself. Implement these traits over whatever
//! transport actually talks to the remote service.

use std::future::Future;
use std::pin::Pin;

use crate::{EntryStatus, ExternalId, ProbeError, SubmitError};

/// Future returned by a submission.
pub type SubmitFuture = Pin<Box<dyn Future<Output = Result<ExternalId, SubmitError>> + Send>>;

/// Future returned by a status probe.
pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<EntryStatus, ProbeError>> + Send>>;

/// Performs one remote submission and resolves to the id the service assigned.
pub trait SubmitOperation: Send + Sync + 'static {
    fn submit(&self) -> SubmitFuture;
}

/// Best-effort remote cancellation. No result is observed.
pub trait CancelOperation: Send + Sync + 'static {
    fn cancel(&self, external_id: &ExternalId);
}

/// Asks the remote service for the current status of a submitted job.
pub trait StatusProbe: Send + Sync + 'static {
    fn probe(&self, external_id: &ExternalId) -> ProbeFuture;
}

/// A closure-based [`SubmitOperation`].
pub struct FnSubmit<F>
where
    F: Fn() -> SubmitFuture + Send + Sync + 'static,
{
    submit: F,
}

impl<F> FnSubmit<F>
where
    F: Fn() -> SubmitFuture + Send + Sync + 'static,
{
    pub fn new(submit: F) -> Self {
        Self { submit }
    }
}

impl<F> SubmitOperation for FnSubmit<F>
where
    F: Fn() -> SubmitFuture + Send + Sync + 'static,
{
    fn submit(&self) -> SubmitFuture {
        (self.submit)()
    }
}

/// A closure-based [`CancelOperation`].
pub struct FnCancel<F>
where
    F: Fn(&ExternalId) + Send + Sync + 'static,
{
    cancel: F,
}

impl<F> FnCancel<F>
where
    F: Fn(&ExternalId) + Send + Sync + 'static,
{
    pub fn new(cancel: F) -> Self {
        Self { cancel }
    }
}

impl<F> CancelOperation for FnCancel<F>
where
    F: Fn(&ExternalId) + Send + Sync + 'static,
{
    fn cancel(&self, external_id: &ExternalId) {
        (self.cancel)(external_id)
    }
}

/// A closure-based [`StatusProbe`].
pub struct FnProbe<F>
where
    F: Fn(&ExternalId) -> ProbeFuture + Send + Sync + 'static,
{
    probe: F,
}

impl<F> FnProbe<F>
where
    F: Fn(&ExternalId) -> ProbeFuture + Send + Sync + 'static,
{
    pub fn new(probe: F) -> Self {
        Self { probe }
    }
}

impl<F> StatusProbe for FnProbe<F>
where
    F: Fn(&ExternalId) -> ProbeFuture + Send + Sync + 'static,
{
    fn probe(&self, external_id: &ExternalId) -> ProbeFuture {
        (self.probe)(external_id)
    }
}
