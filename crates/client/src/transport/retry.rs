//! Retry budget and backoff for transport calls

use std::time::Duration;

use rand::Rng;

use a2abase_core::RetryPolicy;

/// Statuses worth another attempt. Other 4xx never are.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Attempt bookkeeping for one logical call
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
            attempt: 0,
        }
    }

    /// Count an attempt about to be made (1-based).
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts.max(1) {
            return None;
        }
        let base = self.policy.backoff(self.attempt);
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        Some(self.policy.jittered(base, sample))
    }
}
