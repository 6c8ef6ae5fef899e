//! Bounded retry with exponential backoff
//!
//! Wraps workflow calls for hosts whose storage can be briefly unavailable.
//! Only transient errors are retried; concurrency conflicts and validation
//! failures go straight back to the caller.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::domain::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each retry)
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, max_attempts = attempts, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient storage failure");
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(150),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(50));
        assert_eq!(policy.backoff(2), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(150));
        assert_eq!(policy.backoff(10), Duration::from_millis(150));
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let result = quick().run(|| {
            calls += 1;
            if calls < 3 {
                Err(WorkflowError::Store("down".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn attempts_are_capped() {
        let mut calls = 0;
        let result: Result<(), _> = quick().run(|| {
            calls += 1;
            Err(WorkflowError::Store("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn conflicts_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = quick().run(|| {
            calls += 1;
            Err(WorkflowError::ConcurrentModification("f-1234567".parse().unwrap()))
        });
        assert!(matches!(result, Err(WorkflowError::ConcurrentModification(_))));
        assert_eq!(calls, 1);
    }
}
