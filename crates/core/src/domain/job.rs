// Submission Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::record::RecordId;

/// Job ID (UUID v4)
pub type JobId = String;

/// Default number of retries when the portal config does not say otherwise
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Job Status
///
/// Lifecycle: `Pending -> InProgress -> {Completed | Pending (retry) | Failed}`.
/// `InProgress` is only ever entered from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// A batch of queue records bound for one jurisdiction's portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub id: JobId,
    pub jurisdiction_code: String,
    pub employer_id: String,
    pub record_ids: Vec<RecordId>,

    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<i64>, // epoch ms

    pub confirmation_number: Option<String>,
    pub error_message: Option<String>,
    pub records_submitted: Option<i32>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl SubmissionJob {
    /// Create a pending job
    ///
    /// ID and timestamp are injected (IdProvider / Clock), never generated here.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        jurisdiction_code: impl Into<String>,
        employer_id: impl Into<String>,
        record_ids: Vec<RecordId>,
        max_retries: i32,
    ) -> Self {
        Self {
            id: id.into(),
            jurisdiction_code: jurisdiction_code.into(),
            employer_id: employer_id.into(),
            record_ids,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            confirmation_number: None,
            error_message: None,
            records_submitted: None,
            created_at,
            updated_at: created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// True when the job may be claimed at `now_millis`
    pub fn is_due(&self, now_millis: i64) -> bool {
        self.status == JobStatus::Pending && self.next_retry_at.map_or(true, |at| at <= now_millis)
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Pending -> InProgress
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Pending, JobStatus::InProgress)?;
        self.status = JobStatus::InProgress;
        self.started_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// InProgress -> Completed
    pub fn complete(
        &mut self,
        now_millis: i64,
        confirmation_number: Option<String>,
        records_submitted: i32,
    ) -> Result<()> {
        self.expect_status(JobStatus::InProgress, JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.confirmation_number = confirmation_number;
        self.records_submitted = Some(records_submitted);
        self.error_message = None;
        self.next_retry_at = None;
        self.finished_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// InProgress -> Pending, consuming one retry
    ///
    /// `next_retry_at` must lie after `now_millis`.
    pub fn schedule_retry(
        &mut self,
        now_millis: i64,
        next_retry_at: i64,
        error_message: impl Into<String>,
    ) -> Result<()> {
        self.expect_status(JobStatus::InProgress, JobStatus::Pending)?;
        if self.retries_exhausted() {
            return Err(DomainError::RetryBudgetExhausted {
                job_id: self.id.clone(),
                retry_count: self.retry_count,
                max_retries: self.max_retries,
            });
        }
        if next_retry_at <= now_millis {
            return Err(DomainError::ValidationError(format!(
                "next_retry_at {next_retry_at} is not after now {now_millis}"
            )));
        }
        self.status = JobStatus::Pending;
        self.retry_count += 1;
        self.next_retry_at = Some(next_retry_at);
        self.error_message = Some(error_message.into());
        self.started_at = None;
        self.updated_at = now_millis;
        Ok(())
    }

    /// InProgress -> Failed (terminal)
    pub fn fail(&mut self, now_millis: i64, error_message: impl Into<String>) -> Result<()> {
        self.expect_status(JobStatus::InProgress, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.next_retry_at = None;
        self.finished_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
