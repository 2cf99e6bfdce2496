//! Bounded retry of the replace path after a history-id collision.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UpsertError;

/// Limits for re-driving the replace path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total replace attempts per invocation, including the first.
    pub max_attempts: u32,
    /// Delay after the first collision; doubles after each further one.
    pub initial_backoff_ms: u64,
    /// Upper bound for a single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Per-invocation attempt counter.
pub(crate) struct RetryCoordinator {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryCoordinator {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Start the next attempt, returning its 1-based number.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Called after the current attempt collided. Waits out the backoff, or
    /// fails once the attempt budget is spent.
    pub(crate) async fn after_collision(&self, resource_id: &str) -> Result<(), UpsertError> {
        if self.attempts >= self.policy.max_attempts.max(1) {
            return Err(UpsertError::RetryExhausted {
                resource_id: resource_id.to_string(),
                attempts: self.attempts,
            });
        }
        let delay = self.policy.backoff(self.attempts);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}
