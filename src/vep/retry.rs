//! Bounded retry with exponential backoff and jitter
//!
//! Each call to [`RetryPolicy::run`] owns its own [`RetryState`]; nothing is
//! shared between concurrent invocations.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::failure::{format_retry, FailureKind};
use super::{AnnotationServiceError, ServiceError};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;

/// Total attempts per request, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry, doubled for each subsequent one
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound for any single backoff
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Retry policy value object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (>= 1)
    pub max_attempts: u32,
    /// Backoff ceiling before the first retry
    pub initial_backoff: Duration,
    /// Cap for any single backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget and default backoff
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Exponential ceiling for the wait before retry number `retry` (0-based):
    /// `min(max_backoff, initial_backoff * 2^retry)`
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Jittered wait before retry number `retry`, drawn uniformly from
    /// `[ceiling / 2, ceiling]` ("equal jitter")
    pub fn backoff(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms < 2 {
            return ceiling;
        }
        let floor_ms = ceiling_ms / 2;
        Duration::from_millis(rand::rng().random_range(floor_ms..=ceiling_ms))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent. `op` receives the 1-based attempt number.
    ///
    /// A shutdown request during a backoff sleep ends the loop early with the
    /// last observed cause.
    pub async fn run<T, F, Fut>(
        &self,
        shutdown: Option<&ShutdownCoordinator>,
        mut op: F,
    ) -> Result<T, AnnotationServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut state = RetryState::new(self);

        loop {
            let attempt = state.begin_attempt();
            let cause = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(cause) => cause,
            };

            let Some(backoff) = state.next_backoff(&cause) else {
                return Err(AnnotationServiceError::new(attempt, cause));
            };

            warn!(
                attempt,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                "{}",
                format_retry(attempt + 1, self.max_attempts, cause.kind(), backoff)
            );
            metrics::record_retry_backoff(backoff, attempt);

            match shutdown {
                Some(shutdown) => {
                    if shutdown.is_shutdown_requested() {
                        return Err(AnnotationServiceError::new(attempt, cause).interrupted());
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.wait_for_shutdown() => {
                            return Err(AnnotationServiceError::new(attempt, cause).interrupted());
                        }
                    }
                }
                None => tokio::time::sleep(backoff).await,
            }
        }
    }
}

/// Per-call attempt counter
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
}

impl<'a> RetryState<'a> {
    /// Fresh state, no attempts made
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Record the start of an attempt and return its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff before the next attempt, or `None` when the failure is
    /// permanent or the budget is spent
    pub fn next_backoff(&self, cause: &ServiceError) -> Option<Duration> {
        if !cause.is_transient() || self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.backoff(self.attempts - 1))
    }
}

/// Build a transient [`ServiceError`]
pub fn transient(kind: FailureKind, message: impl Into<String>) -> ServiceError {
    ServiceError::Transient {
        kind,
        message: message.into(),
    }
}

/// Build a permanent [`ServiceError`]
pub fn permanent(kind: FailureKind, message: impl Into<String>) -> ServiceError {
    ServiceError::Permanent {
        kind,
        message: message.into(),
    }
}
