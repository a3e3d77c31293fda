//! Wait-then-retry policy for incomplete responses
//!
//! When a response fails the completeness check, the run parks for a long
//! fixed delay (the upstream session is usually rate limited) and then tells
//! the caller to clear the pending input and resubmit. By default there is no
//! ceiling on the number of retries; an optional ceiling can be configured.

use std::time::Duration;

use crate::context::RunContext;

/// Outcome of one wait-before-retry cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait finished; clear pending input and resubmit
    Resubmit,
    /// The configured retry ceiling was reached; fail this target
    GiveUp,
    /// The run was cancelled during the wait
    Cancelled,
}

/// Fixed-delay retry policy with periodic progress reporting
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// How long to park before resubmitting
    pub wait: Duration,
    /// How often to log remaining time during the wait
    pub progress_interval: Duration,
    /// `None` means effectively unlimited retries
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(30 * 60),
            progress_interval: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Park before retry number `retry` (1-based) of the given target.
    ///
    /// Logs the remaining wait at every progress interval and polls the
    /// cancellation flag throughout. Has no side effects beyond timing and
    /// logging.
    pub async fn wait_before_retry(
        &self,
        ctx: &RunContext,
        round: u32,
        target_line: usize,
        retry: u32,
    ) -> RetryDecision {
        if let Some(max) = self.max_retries {
            if retry > max {
                tracing::error!(round, target_line, retry, max, "retry ceiling reached");
                return RetryDecision::GiveUp;
            }
        }

        tracing::warn!(
            round,
            target_line,
            retry,
            wait_secs = self.wait.as_secs(),
            "response incomplete, waiting before retry"
        );

        let interval = self.progress_interval.max(Duration::from_secs(1));
        let mut remaining = self.wait;
        while remaining > Duration::ZERO {
            let step = remaining.min(interval);
            if !ctx.sleep(step).await {
                return RetryDecision::Cancelled;
            }
            remaining = remaining.saturating_sub(step);
            if remaining > Duration::ZERO {
                tracing::info!(
                    round,
                    target_line,
                    remaining_secs = remaining.as_secs(),
                    "still waiting before retry"
                );
            }
        }

        tracing::info!(round, target_line, retry, "wait finished, resubmitting");
        RetryDecision::Resubmit
    }
}
