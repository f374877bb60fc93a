// Submission Driver Port
//
// The orchestrator hands over an encoded batch and gets a result back. Drivers never
// return errors; every failure is folded into `DriverResult`.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{ErrorRow, JobId, JurisdictionDescriptor, PortalConfig, RecordId, SubmissionRecord};
use crate::encoding::Artifact;
use crate::port::browser::CaptureRef;

#[derive(Debug, Clone)]
pub struct DriverRequest {
    pub job_id: JobId,
    pub descriptor: &'static JurisdictionDescriptor,
    pub config: PortalConfig,
    /// Records in artifact order
    pub records: Vec<SubmissionRecord>,
    pub artifact: Artifact,
}

/// A record the portal refused and the driver removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// `None` when the portal's row could not be tied to a record
    pub record_id: Option<RecordId>,
    pub row_number: u32,
    pub reference: String,
    pub reasons: Vec<String>,
}

/// An error row together with the attempt that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub attempt: u32,
    pub row: ErrorRow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverResult {
    pub success: bool,
    pub message: String,
    pub confirmation_numbers: Vec<String>,
    pub rejected_rows: Vec<RejectedRow>,
    pub records_submitted: usize,
    pub submitted_record_ids: Vec<RecordId>,
    /// Error rows from every attempt
    pub errors: Vec<ReportedError>,
    pub attempts: u32,
    pub captures: Vec<CaptureRef>,
    /// Confirm was clicked but its result never arrived; the batch may already be live
    pub outcome_unknown: bool,
}

impl DriverResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Rejection reasons for a record, if the driver removed it
    pub fn rejection_for(&self, record_id: &str) -> Option<&RejectedRow> {
        self.rejected_rows
            .iter()
            .find(|r| r.record_id.as_deref() == Some(record_id))
    }
}

#[async_trait]
pub trait SubmissionDriver: Send + Sync {
    async fn submit(&self, request: DriverRequest) -> DriverResult;
}

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum DriverBehavior {
        /// Accept every record in the artifact
        AcceptAll,
        /// Accept all but these record IDs, which are rejected with the reason
        Reject(Vec<(String, String)>),
        Fail(String),
        Panic(String),
        /// Fail after the confirm click, outcome unknown
        Unconfirmed(String),
        /// Sleep before accepting (for concurrency tests)
        Slow(std::time::Duration),
    }

    /// Replays queued behaviors, then repeats the last one
    pub struct ScriptedDriver {
        script: Mutex<VecDeque<DriverBehavior>>,
        last: Mutex<DriverBehavior>,
        requests: Mutex<Vec<DriverRequest>>,
    }

    impl ScriptedDriver {
        pub fn new(script: impl IntoIterator<Item = DriverBehavior>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                last: Mutex::new(DriverBehavior::AcceptAll),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn accept_all() -> Self {
            Self::new([DriverBehavior::AcceptAll])
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<DriverRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn next(&self) -> DriverBehavior {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(b) => {
                    *self.last.lock().unwrap() = b.clone();
                    b
                }
                None => self.last.lock().unwrap().clone(),
            }
        }
    }

    fn accepted(request: &DriverRequest, rejected: &[(String, String)]) -> DriverResult {
        let submitted: Vec<RecordId> = request
            .artifact
            .rows
            .iter()
            .map(|r| r.record_id.clone())
            .filter(|id| !rejected.iter().any(|(r, _)| r == id))
            .collect();
        let rejected_rows = request
            .artifact
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                rejected
                    .iter()
                    .find(|(id, _)| *id == row.record_id)
                    .map(|(id, reason)| RejectedRow {
                        record_id: Some(id.clone()),
                        row_number: i as u32 + 1,
                        reference: id.clone(),
                        reasons: vec![reason.clone()],
                    })
            })
            .collect();
        DriverResult {
            success: true,
            message: "submitted".into(),
            confirmation_numbers: vec![format!("CONF-{}", request.job_id)],
            rejected_rows,
            records_submitted: submitted.len(),
            submitted_record_ids: submitted,
            attempts: 1,
            ..Default::default()
        }
    }

    #[async_trait]
    impl SubmissionDriver for ScriptedDriver {
        async fn submit(&self, request: DriverRequest) -> DriverResult {
            self.requests.lock().unwrap().push(request.clone());
            match self.next() {
                DriverBehavior::AcceptAll => accepted(&request, &[]),
                DriverBehavior::Reject(rejected) => accepted(&request, &rejected),
                DriverBehavior::Fail(msg) => DriverResult::failure(msg),
                DriverBehavior::Panic(msg) => panic!("{}", msg),
                DriverBehavior::Unconfirmed(msg) => DriverResult {
                    outcome_unknown: true,
                    attempts: 1,
                    ..DriverResult::failure(msg)
                },
                DriverBehavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    accepted(&request, &[])
                }
            }
        }
    }
}
