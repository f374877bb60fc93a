//! Table rows and formatting for operator output

use chrono::{TimeZone, Utc};
use colored::Colorize;
use tabled::Tabled;
use wotc_core::domain::{JobStatus, QueueRecord, RecordStatus, SubmissionJob};

pub fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn job_status(status: JobStatus) -> String {
    match status {
        JobStatus::Pending => status.as_str().yellow().to_string(),
        JobStatus::InProgress => status.as_str().cyan().to_string(),
        JobStatus::Completed => status.as_str().green().to_string(),
        JobStatus::Failed => status.as_str().red().to_string(),
    }
}

fn record_status(status: RecordStatus) -> String {
    match status {
        RecordStatus::Submitted => status.as_str().green().to_string(),
        RecordStatus::Failed => status.as_str().red().to_string(),
        _ => status.as_str().to_string(),
    }
}

fn dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[derive(Tabled)]
pub struct JobLine {
    id: String,
    jurisdiction: String,
    employer: String,
    status: String,
    records: usize,
    retries: String,
    next_retry: String,
    confirmation: String,
    created: String,
}

impl From<&SubmissionJob> for JobLine {
    fn from(job: &SubmissionJob) -> Self {
        Self {
            id: job.id.clone(),
            jurisdiction: job.jurisdiction_code.clone(),
            employer: job.employer_id.clone(),
            status: job_status(job.status),
            records: job.record_ids.len(),
            retries: format!("{}/{}", job.retry_count, job.max_retries),
            next_retry: format_millis(job.next_retry_at),
            confirmation: dash(job.confirmation_number.as_deref()),
            created: format_millis(Some(job.created_at)),
        }
    }
}

#[derive(Tabled)]
pub struct RecordLine {
    record: String,
    status: String,
    failures: i32,
    last_failure: String,
    updated: String,
}

impl From<&QueueRecord> for RecordLine {
    fn from(record: &QueueRecord) -> Self {
        Self {
            record: record.id.clone(),
            status: record_status(record.status),
            failures: record.failure_count,
            last_failure: dash(record.last_failure_reason.as_deref()),
            updated: format_millis(Some(record.updated_at)),
        }
    }
}

#[derive(Tabled)]
pub struct ValidationLine {
    pub record: String,
    pub valid: String,
    pub issues: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(None), "-");
        assert_eq!(format_millis(Some(0)), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_job_line() {
        colored::control::set_override(false);
        let mut job = SubmissionJob::new("j1", 0, "AZ", "emp-1", vec!["a".into(), "b".into()], 3);
        job.start(1).unwrap();
        job.schedule_retry(2, 300_002, "portal down").unwrap();

        let line = JobLine::from(&job);
        assert_eq!(line.status, "PENDING");
        assert_eq!(line.records, 2);
        assert_eq!(line.retries, "1/3");
        assert_eq!(line.confirmation, "-");
    }
}
