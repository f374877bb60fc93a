// Retry backoff policy
use crate::domain::{PortalConfig, SubmissionJob};
use tracing::{info, warn};

/// Backoff base used when a jurisdiction has no portal config
pub const DEFAULT_BACKOFF_BASE_MS: i64 = 5 * 60 * 1000;

/// Exponent cap so the delay never overflows
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the job, not before `next_retry_at` (epoch ms)
    Retry { next_retry_at: i64, delay_ms: i64 },
    /// Do not retry, job has failed permanently
    Failed,
}

/// Exponential backoff: `base × 2^(retry_count − 1)` where `retry_count` is the value
/// after the failed attempt is counted.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay_ms: i64,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: i64) -> Self {
        Self {
            base_delay_ms: base_delay_ms.max(1),
        }
    }

    pub fn for_config(config: Option<&PortalConfig>) -> Self {
        match config {
            Some(c) => Self::new(i64::try_from(c.backoff_base_secs.saturating_mul(1000)).unwrap_or(i64::MAX)),
            None => Self::new(DEFAULT_BACKOFF_BASE_MS),
        }
    }

    /// Delay before the run numbered `retry_count` (1 = first retry)
    pub fn delay_ms(&self, retry_count: i32) -> i64 {
        let exponent = (retry_count.max(1) - 1).min(MAX_BACKOFF_EXPONENT as i32) as u32;
        self.base_delay_ms.saturating_mul(1i64 << exponent)
    }

    /// Decide what happens to `job` after a failed run at `now_millis`
    pub fn decide(&self, job: &SubmissionJob, now_millis: i64) -> RetryDecision {
        if job.retries_exhausted() {
            warn!(
                job_id = %job.id,
                retry_count = %job.retry_count,
                max_retries = %job.max_retries,
                "Max retries reached"
            );
            return RetryDecision::Failed;
        }

        let delay_ms = self.delay_ms(job.retry_count + 1);
        let next_retry_at = now_millis.saturating_add(delay_ms);
        info!(
            job_id = %job.id,
            retry_count = %(job.retry_count + 1),
            max_retries = %job.max_retries,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );
        RetryDecision::Retry {
            next_retry_at,
            delay_ms,
        }
    }
}
