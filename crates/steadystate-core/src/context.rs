//! Per-invocation context
//!
//! Every lifecycle invocation receives its cancellation signal and deadline
//! explicitly; nothing is fetched from process-wide state.

use crate::error::{CoreError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline inherited by every call in one invocation
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the context to an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        // A child context never outlives its parent
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail with `Cancelled` if cancellation was requested
    pub fn check(&self, operation: &str, key: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(CoreError::Cancelled {
                operation: operation.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Run one remote call under the inherited deadline.
    ///
    /// Cancellation is only observed before the call starts; a call that
    /// is already in flight runs to completion or to the deadline.
    pub async fn call<T, F>(&self, operation: &str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation, key)?;
        tracing::debug!("{} ({})", operation, key);

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| CoreError::DeadlineExceeded {
                    operation: operation.to_string(),
                    key: key.to_string(),
                })?,
            None => fut.await,
        }
    }
}
