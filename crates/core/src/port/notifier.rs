// Notifier Port
//
// Terminal job states are pushed to external collaborators (webhook, email, SMS).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{JobStatus, SubmissionJob};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid notifier configuration: {0}")]
    Config(String),
}

/// Terminal job event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobNotification {
    pub job_id: String,
    pub jurisdiction: String,
    pub employer_id: String,
    pub status: JobStatus,
    pub confirmation_number: Option<String>,
    pub records_submitted: usize,
    pub records_failed: usize,
    pub error_message: Option<String>,
    /// epoch ms
    pub finished_at: i64,
}

impl JobNotification {
    pub fn from_job(job: &SubmissionJob, records_failed: usize) -> Self {
        Self {
            job_id: job.id.clone(),
            jurisdiction: job.jurisdiction_code.clone(),
            employer_id: job.employer_id.clone(),
            status: job.status,
            confirmation_number: job.confirmation_number.clone(),
            records_submitted: job.records_submitted.unwrap_or(0).max(0) as usize,
            records_failed,
            error_message: job.error_message.clone(),
            finished_at: job.finished_at.unwrap_or(job.updated_at),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "WOTC submission {} for {} ({})",
            self.status.as_str().to_lowercase(),
            self.employer_id,
            self.jurisdiction
        )
    }

    /// Plain-text status line
    pub fn summary(&self) -> String {
        let mut out = match self.status {
            JobStatus::Completed => format!(
                "{} job {} completed: {} submitted, {} failed",
                self.jurisdiction, self.job_id, self.records_submitted, self.records_failed
            ),
            _ => format!(
                "{} job {} failed: {} records not submitted",
                self.jurisdiction, self.job_id, self.records_failed
            ),
        };
        if let Some(conf) = &self.confirmation_number {
            out.push_str(&format!(". Confirmation {conf}"));
        }
        if let Some(err) = &self.error_message {
            out.push_str(&format!(". {err}"));
        }
        out
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name for logs ("webhook", "email", "sms")
    fn channel(&self) -> &'static str;

    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification; optionally fails each call
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<JobNotification>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<JobNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(NotifyError::Transport("unreachable".into()));
            }
            Ok(())
        }
    }
}
