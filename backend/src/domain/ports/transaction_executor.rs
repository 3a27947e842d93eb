//! Port for all-or-nothing execution of a unit of work.
//!
//! A unit of work is a closure receiving the scoped [`EntityTransaction`]
//! and returning a boxed future of its own result. The executor commits when
//! that result is `Ok` and rolls back otherwise; a rollback failure is merged
//! into the original error through [`UnitOfWorkError::with_rollback_failure`].
//!
//! Callers can bound the work with an [`ExecutionContext`]. A timeout or a
//! cancellation observed while the work is running is handled exactly like a
//! failed unit of work.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::domain::Error;

use super::{EntityTransaction, StoreError};

/// Why a unit of work stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interruption {
    /// The caller's [`CancelHandle`] fired.
    #[error("transaction cancelled by caller")]
    Cancelled,
    /// The context deadline elapsed.
    #[error("transaction timed out")]
    TimedOut,
}

/// Error types a unit of work may fail with.
pub trait UnitOfWorkError: From<StoreError> + Send {
    /// Build the error reported when the work was interrupted.
    fn interrupted(reason: Interruption) -> Self;

    /// Attach a rollback failure while keeping `self` as the primary cause.
    #[must_use]
    fn with_rollback_failure(self, rollback: StoreError) -> Self;
}

impl UnitOfWorkError for Error {
    fn interrupted(reason: Interruption) -> Self {
        Error::service_unavailable(reason.to_string())
    }

    fn with_rollback_failure(self, rollback: StoreError) -> Self {
        Error::internal(format!("tx error: {self}, rb err: {rollback}"))
    }
}

/// Create a linked cancel handle and signal.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] leaves the
/// signal pending forever.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle(sender), CancelSignal(receiver))
}

/// Caller side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Request cancellation of every context holding the paired signal.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Executor side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.0.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Caller supplied limits for one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
}

impl ExecutionContext {
    /// Context without timeout or cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole execution, lock waits included, by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the execution when `signal` fires.
    #[must_use]
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether cancellation was requested before the call.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    /// Start the clock for one execution.
    pub fn start(&self) -> ExecutionScope {
        ExecutionScope {
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
            cancel: self.cancel.clone(),
        }
    }
}

/// A started [`ExecutionContext`] with an absolute deadline.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
}

impl ExecutionScope {
    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Check for interruption without waiting.
    ///
    /// # Errors
    ///
    /// Returns the pending [`Interruption`], cancellation first.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(Interruption::Cancelled);
        }
        if self.remaining().is_some_and(|left| left.is_zero()) {
            return Err(Interruption::TimedOut);
        }
        Ok(())
    }

    /// Drive `work` until it completes or the scope is interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`Interruption`] if cancellation or the deadline wins. The
    /// work future is dropped at that point.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        let cancelled = async {
            match &self.cancel {
                Some(signal) => signal.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(Interruption::Cancelled),
            () = expired => Err(Interruption::TimedOut),
            output = work => Ok(output),
        }
    }
}

/// Runs units of work inside a single store transaction.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Execute `work` atomically.
    ///
    /// Commits when `work` returns `Ok`; otherwise rolls back and returns the
    /// unit of work's error. A commit failure is reported through
    /// `E::from(StoreError)`. Interruption observed before the transaction
    /// opens aborts without touching the store. Nothing is retried.
    async fn execute<T, E, F>(&self, context: &ExecutionContext, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: UnitOfWorkError + 'static,
        F: for<'t> FnOnce(&'t mut dyn EntityTransaction) -> BoxFuture<'t, Result<T, E>>
            + Send
            + 'static;
}
