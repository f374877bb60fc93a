// Job/record accounting for the end of a run
//
// Shared by the orchestrator and the staleness sweep so both apply identical rules.

use std::collections::HashSet;

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{
    DomainError, JobId, RecordId, RecordStatus, RecordTransition, SubmissionJob,
};
use crate::error::Result;
use crate::port::{DriverResult, JobStore};

/// A record that did not reach the portal, or that the portal refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub record_id: RecordId,
    pub reason: String,
}

impl RecordFailure {
    pub fn new(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            reason: reason.into(),
        }
    }
}

fn reason_for<'a>(failures: &'a [RecordFailure], record_id: &str) -> Option<&'a str> {
    failures
        .iter()
        .find(|f| f.record_id == record_id)
        .map(|f| f.reason.as_str())
}

/// Keep only transitions for records still `IN_PROGRESS` under `job_id`
///
/// Records settled by an earlier run are left untouched by the store, so they must not
/// be counted as failed again.
pub async fn retain_in_progress(
    store: &dyn JobStore,
    job_id: &JobId,
    transitions: Vec<RecordTransition>,
) -> Result<Vec<RecordTransition>> {
    let live: HashSet<RecordId> = store
        .find_records(job_id)
        .await?
        .into_iter()
        .filter(|r| r.status == RecordStatus::InProgress)
        .map(|r| r.id)
        .collect();
    Ok(transitions
        .into_iter()
        .filter(|t| live.contains(&t.record_id))
        .collect())
}

pub fn failed_count(transitions: &[RecordTransition]) -> usize {
    transitions
        .iter()
        .filter(|t| t.status == RecordStatus::Failed)
        .count()
}

/// Failed run: requeue with backoff, or fail for good when `permanent` or out of retries
///
/// Records named in `record_failures` always end `FAILED` with their own reason so they
/// are never resubmitted unchanged; the rest are released or failed with `message`.
pub fn apply_failure(
    job: &mut SubmissionJob,
    now_millis: i64,
    policy: &RetryPolicy,
    message: &str,
    permanent: bool,
    record_failures: &[RecordFailure],
) -> std::result::Result<Vec<RecordTransition>, DomainError> {
    let decision = if permanent {
        RetryDecision::Failed
    } else {
        policy.decide(job, now_millis)
    };

    let requeue = match decision {
        RetryDecision::Retry { next_retry_at, .. } => {
            job.schedule_retry(now_millis, next_retry_at, message)?;
            true
        }
        RetryDecision::Failed => {
            job.fail(now_millis, message)?;
            false
        }
    };

    Ok(job
        .record_ids
        .iter()
        .map(|id| match reason_for(record_failures, id) {
            Some(reason) => RecordTransition::failed(id, reason),
            None if requeue => RecordTransition::released(id),
            None => RecordTransition::failed(id, message),
        })
        .collect())
}

/// Successful run: only records the driver confirmed become `SUBMITTED`
pub fn apply_success(
    job: &mut SubmissionJob,
    now_millis: i64,
    result: &DriverResult,
    record_failures: &[RecordFailure],
) -> std::result::Result<Vec<RecordTransition>, DomainError> {
    let submitted: HashSet<&str> = result
        .submitted_record_ids
        .iter()
        .map(String::as_str)
        .collect();
    let confirmation = (!result.confirmation_numbers.is_empty())
        .then(|| result.confirmation_numbers.join(", "));
    job.complete(now_millis, confirmation, submitted.len() as i32)?;

    let transitions: Vec<RecordTransition> = job
        .record_ids
        .iter()
        .map(|id| {
            if submitted.contains(id.as_str()) {
                return RecordTransition::submitted(id);
            }
            if let Some(reason) = reason_for(record_failures, id) {
                return RecordTransition::failed(id, reason);
            }
            match result.rejection_for(id) {
                Some(row) if !row.reasons.is_empty() => {
                    RecordTransition::failed(id, row.reasons.join("; "))
                }
                _ => RecordTransition::failed(id, "not confirmed by portal"),
            }
        })
        .collect();

    let rejected = transitions
        .iter()
        .filter(|t| t.status != crate::domain::RecordStatus::Submitted)
        .count();
    if rejected > 0 {
        job.error_message = Some(format!(
            "{rejected} of {} records not submitted",
            job.record_ids.len()
        ));
    }
    Ok(transitions)
}
