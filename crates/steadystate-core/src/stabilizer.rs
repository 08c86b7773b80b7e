//! Wait for the remote system to reflect a just-issued mutation
//!
//! Mutations are accepted before their effects are visible to reads. The
//! stabilizer polls a lookup until a convergence predicate holds, the
//! timeout elapses, or the invocation is cancelled.

use crate::config::StabilizeConfig;
use crate::context::InvocationContext;
use crate::error::{CoreError, Result};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Why a stabilization wait ended without convergence
#[derive(Debug)]
pub enum StabilizeError<T> {
    /// Timed out; carries the last snapshot seen, if any
    NotStable {
        key: String,
        elapsed: Duration,
        polls: u32,
        last_observed: Option<T>,
    },

    /// The invocation was asked to stop
    Cancelled { key: String },

    /// A lookup failed with something other than `NotFound`
    Lookup(CoreError),
}

impl<T> StabilizeError<T> {
    /// Last snapshot seen before giving up, for partial progress reporting
    pub fn last_observed(&self) -> Option<&T> {
        match self {
            StabilizeError::NotStable { last_observed, .. } => last_observed.as_ref(),
            _ => None,
        }
    }
}

impl<T: fmt::Debug> StabilizeError<T> {
    pub fn into_error(self, operation: &str) -> CoreError {
        match self {
            StabilizeError::NotStable {
                key,
                elapsed,
                polls,
                last_observed,
            } => CoreError::NotStable {
                key,
                elapsed,
                polls,
                last_observed: last_observed.map(|observed| format!("{:?}", observed)),
            },
            StabilizeError::Cancelled { key } => CoreError::Cancelled {
                operation: operation.to_string(),
                key,
            },
            StabilizeError::Lookup(err) => err,
        }
    }
}

/// Polls a lookup until a convergence predicate holds
#[derive(Debug, Clone, Copy)]
pub struct Stabilizer {
    config: StabilizeConfig,
}

impl Stabilizer {
    pub fn new(config: StabilizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StabilizeConfig {
        &self.config
    }

    /// Poll `lookup` every `interval` until `converged` holds.
    ///
    /// A `NotFound` lookup counts as "not visible yet" and keeps polling;
    /// any other lookup error ends the wait immediately. The timeout is
    /// clamped to whatever remains of the invocation's deadline.
    /// Cancellation is checked between polls, never during one.
    pub async fn wait<T, L, Fut, P>(
        &self,
        ctx: &InvocationContext,
        key: &str,
        mut lookup: L,
        mut converged: P,
    ) -> std::result::Result<T, StabilizeError<T>>
    where
        L: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnMut(&T) -> bool,
    {
        let started = Instant::now();
        let timeout = match ctx.remaining() {
            Some(remaining) => self.config.timeout.min(remaining),
            None => self.config.timeout,
        };
        let deadline = started + timeout;
        let mut last_observed = None;
        let mut polls = 0u32;

        loop {
            if ctx.is_cancelled() {
                return Err(StabilizeError::Cancelled {
                    key: key.to_string(),
                });
            }

            polls += 1;
            match lookup().await {
                Ok(observed) => {
                    if converged(&observed) {
                        tracing::debug!("{} stable after {} polls", key, polls);
                        return Ok(observed);
                    }
                    last_observed = Some(observed);
                }
                Err(err) if err.is_not_found() => {
                    tracing::debug!("{} not visible yet (poll {})", key, polls);
                }
                Err(err) => return Err(StabilizeError::Lookup(err)),
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("{} not stable after {:?}", key, now - started);
                return Err(StabilizeError::NotStable {
                    key: key.to_string(),
                    elapsed: now - started,
                    polls,
                    last_observed,
                });
            }

            let pause = self.config.interval.min(deadline - now);
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    return Err(StabilizeError::Cancelled { key: key.to_string() });
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn stabilizer(timeout_secs: u64, interval_secs: u64) -> Stabilizer {
        Stabilizer::new(StabilizeConfig::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_converged_returns_after_one_poll() {
        let polls = AtomicU32::new(0);
        let started = Instant::now();

        let observed = stabilizer(60, 1)
            .wait(
                &InvocationContext::new(),
                "inst-1,origin-A",
                || async {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Ok("origin-A")
                },
                |o| *o == "origin-A",
            )
            .await
            .unwrap();

        assert_eq!(observed, "origin-A");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_lag() {
        let polls = AtomicU32::new(0);

        let observed = stabilizer(60, 1)
            .wait(
                &InvocationContext::new(),
                "inst-1,rule-1",
                || async {
                    let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 4 {
                        Err(CoreError::not_found("rule-1"))
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await
            .unwrap();

        assert_eq!(observed, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_converging_times_out() {
        let started = Instant::now();
        let polls = AtomicU32::new(0);

        let err = stabilizer(10, 1)
            .wait(
                &InvocationContext::new(),
                "inst-1,rule-1",
                || async {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Ok("DRAFT")
                },
                |status| *status == "PUBLISHED",
            )
            .await
            .unwrap_err();

        let elapsed = Instant::now() - started;
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(11));
        assert_eq!(err.last_observed(), Some(&"DRAFT"));

        match err {
            StabilizeError::NotStable { polls: n, .. } => {
                assert_eq!(n, polls.load(Ordering::SeqCst));
                assert_eq!(n, 11);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clamped_to_invocation_deadline() {
        let ctx = InvocationContext::new().with_timeout(Duration::from_secs(3));
        let started = Instant::now();

        let err = stabilizer(60, 1)
            .wait(&ctx, "k", || async { Ok(0) }, |_| false)
            .await
            .unwrap_err();

        assert!(matches!(err, StabilizeError::NotStable { .. }));
        assert!(Instant::now() - started <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_distinct_from_timeout() {
        let ctx = InvocationContext::new();
        let token = ctx.cancellation().clone();
        let polls = Arc::new(AtomicU32::new(0));

        let counter = polls.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            token.cancel();
        });

        let err = stabilizer(60, 1)
            .wait(
                &ctx,
                "inst-1,origin-A",
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                |_| false,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StabilizeError::Cancelled { .. }));
        // Polls at t=0, 1, 2; cancelled while sleeping towards t=3
        assert_eq!(polls.load(Ordering::SeqCst), 3);

        let core = err.into_error("create");
        assert!(matches!(core, CoreError::Cancelled { .. }));
        assert!(!core.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_error_aborts() {
        let polls = AtomicU32::new(0);

        let err = stabilizer(60, 1)
            .wait(
                &InvocationContext::new(),
                "k",
                || async {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CoreError::State("throttled".to_string()))
                },
                |_| true,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StabilizeError::Lookup(CoreError::State(_))));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_stable_error_keeps_last_observed() {
        let err: StabilizeError<&str> = StabilizeError::NotStable {
            key: "inst-1,rule-1".to_string(),
            elapsed: Duration::from_secs(60),
            polls: 61,
            last_observed: Some("DRAFT"),
        };

        let core = err.into_error("update");
        assert!(core.is_retryable());
        assert!(core.to_string().contains("\"DRAFT\""));
    }
}
