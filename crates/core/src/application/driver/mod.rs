// Portal Driver
//
// Drives one jurisdiction portal through login -> upload -> validate -> (correct and
// retry | confirm) under a bounded attempt budget. Every failure is folded into the
// returned `DriverResult`; nothing escapes as an error.

pub mod browser_portal;
pub mod classify;
pub mod correction;
pub mod error_table;
pub mod pacing;
pub mod state;

pub use browser_portal::{max_run_duration, BrowserPortal, BrowserPortalFactory};
pub use classify::{classify, Disposition, ErrorKind, RowVerdict};
pub use correction::{correct, next_signer, Correction};
pub use pacing::Pacer;
pub use state::{DriverState, StateMachine};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::domain::{DomainError, JobId, JurisdictionDescriptor, SubmissionRecord};
use crate::encoding::{self, Artifact};
use crate::port::{
    DriverRequest, DriverResult, PortalError, PortalOperations, PortalSessionFactory,
    ReportedError, SubmissionDriver, ValidationOutcome,
};

/// How one upload attempt ended
enum Step {
    Confirmed(Vec<String>),
    /// Batch corrected and deleted; upload again
    Retry,
    Abort(String),
    /// Confirm was clicked but no confirmation came back; the batch may be live
    Unconfirmed(String),
}

enum StepError {
    Portal(PortalError),
    Transition(DomainError),
}

impl From<PortalError> for StepError {
    fn from(e: PortalError) -> Self {
        StepError::Portal(e)
    }
}

impl From<DomainError> for StepError {
    fn from(e: DomainError) -> Self {
        StepError::Transition(e)
    }
}

pub struct PortalDriver {
    machine: StateMachine,
    job_id: JobId,
    descriptor: &'static JurisdictionDescriptor,
    signer_candidates: Vec<String>,
    max_attempts: u32,
    records: Vec<SubmissionRecord>,
    artifact: Artifact,
    result: DriverResult,
}

impl PortalDriver {
    pub fn new(request: DriverRequest) -> Self {
        Self {
            machine: StateMachine::new(),
            job_id: request.job_id,
            descriptor: request.descriptor,
            signer_candidates: request.config.signer_candidates,
            max_attempts: request.config.max_attempts.max(1),
            records: request.records,
            artifact: request.artifact,
            result: DriverResult::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.machine.state()
    }

    pub fn history(&self) -> &[DriverState] {
        self.machine.history()
    }

    /// Run the workflow to a terminal state
    pub async fn run(&mut self, ops: &mut dyn PortalOperations) -> DriverResult {
        let mut attempt: u32 = 0;
        let mut last_error = String::from("no attempt made");

        loop {
            if attempt >= self.max_attempts {
                let message = format!(
                    "gave up after {} attempts: {}",
                    self.max_attempts, last_error
                );
                return self.abort(message);
            }

            if self.machine.state() == DriverState::LoggedOut {
                if let Err(e) = self.machine.transition(DriverState::LoggingIn) {
                    return self.abort(e.to_string());
                }
                let report = ops.login().await;
                self.result.captures.extend(report.capture.clone());
                if !report.authenticated {
                    attempt += 1;
                    self.result.attempts = attempt;
                    last_error = format!(
                        "login failed: {}",
                        report.diagnostic.as_deref().unwrap_or("dashboard not reached")
                    );
                    warn!(job_id = %self.job_id, attempt, error = %last_error, "Portal login failed");
                    if let Err(e) = self.machine.transition(DriverState::LoggedOut) {
                        return self.abort(e.to_string());
                    }
                    continue;
                }
                debug!(job_id = %self.job_id, landed = ?report.landed_url, "Logged in");
                if let Err(e) = self.machine.transition(DriverState::Dashboard) {
                    return self.abort(e.to_string());
                }
            }

            attempt += 1;
            self.result.attempts = attempt;
            info!(
                job_id = %self.job_id,
                jurisdiction = self.descriptor.code,
                attempt,
                records = self.artifact.record_count(),
                "Uploading batch"
            );

            match self.attempt(ops, attempt).await {
                Ok(Step::Confirmed(confirmations)) => return self.succeed(confirmations),
                Ok(Step::Retry) => last_error = "portal reported blocking errors".to_string(),
                Ok(Step::Abort(message)) => return self.abort(message),
                Ok(Step::Unconfirmed(reason)) => {
                    self.capture(ops, attempt, "unconfirmed").await;
                    return self.abort_unconfirmed(reason);
                }
                Err(StepError::Transition(e)) => return self.abort(e.to_string()),
                Err(StepError::Portal(e)) => {
                    warn!(job_id = %self.job_id, attempt, error = %e, "Portal step failed");
                    last_error = e.to_string();
                    self.recover_from(ops, attempt).await;
                }
            }
        }
    }

    async fn attempt(&mut self, ops: &mut dyn PortalOperations, attempt: u32) -> Result<Step, StepError> {
        self.machine.transition(DriverState::UploadStaged)?;
        ops.stage_upload(&self.artifact).await?;
        self.capture(ops, attempt, "staged").await;

        self.machine.transition(DriverState::Validating)?;
        let rows = match ops.await_validation().await? {
            ValidationOutcome::Clean => Vec::new(),
            ValidationOutcome::Errors(table) => error_table::parse(&table),
        };
        self.result.errors.extend(rows.iter().cloned().map(|row| ReportedError { attempt, row }));

        let blocking: Vec<_> = rows.into_iter().filter(|r| r.is_blocking()).collect();
        if blocking.is_empty() {
            self.machine.transition(DriverState::Clean)?;
            self.machine.transition(DriverState::Confirming)?;
            let confirmations = match ops.confirm_batch().await {
                Ok(confirmations) => confirmations,
                Err(e) => return Ok(Step::Unconfirmed(e.to_string())),
            };
            self.capture(ops, attempt, "confirmed").await;
            self.machine.transition(DriverState::Done)?;
            return Ok(Step::Confirmed(confirmations));
        }

        self.machine.transition(DriverState::HasErrors)?;
        self.capture(ops, attempt, "errors").await;
        info!(
            job_id = %self.job_id,
            attempt,
            blocking = blocking.len(),
            "Portal reported blocking errors"
        );

        self.machine.transition(DriverState::Recovering)?;
        let verdicts = classify(&blocking, self.descriptor, self.signer_candidates.len());
        let correction = correct(
            self.descriptor,
            &self.records,
            &verdicts,
            &self.signer_candidates,
        );
        ops.delete_batch().await?;
        self.machine.transition(DriverState::Deleted)?;

        for (record_id, signer) in &correction.rotated {
            info!(job_id = %self.job_id, record_id = %record_id, signer = %signer, "Rotated signer");
        }
        if !correction.changed() {
            warn!(job_id = %self.job_id, "Nothing to remove or rotate, resubmitting the same batch");
        }
        if !correction.unmatched.is_empty() {
            warn!(
                job_id = %self.job_id,
                unmatched = correction.unmatched.len(),
                "Error rows could not be tied to records"
            );
        }
        self.result.rejected_rows.extend(correction.removed);
        self.records = correction.records;

        if self.records.is_empty() {
            return Ok(Step::Abort("no records remain after removing rejected rows".to_string()));
        }
        match encoding::encode_with(self.descriptor, &self.records) {
            Ok(artifact) => self.artifact = artifact,
            Err(e) => return Ok(Step::Abort(format!("re-encoding failed: {e}"))),
        }
        Ok(Step::Retry)
    }

    /// Best-effort cleanup after a failed step, then start over from login
    async fn recover_from(&mut self, ops: &mut dyn PortalOperations, attempt: u32) {
        self.capture(ops, attempt, "failure").await;
        let staged = matches!(
            self.machine.state(),
            DriverState::UploadStaged
                | DriverState::Validating
                | DriverState::HasErrors
                | DriverState::Recovering
        );
        if staged {
            if let Err(e) = ops.delete_batch().await {
                debug!(job_id = %self.job_id, error = %e, "Cleanup delete failed");
            }
        }
        if let Err(e) = self.machine.transition(DriverState::LoggedOut) {
            warn!(job_id = %self.job_id, error = %e, "Could not reset driver state");
        }
    }

    async fn capture(&mut self, ops: &mut dyn PortalOperations, attempt: u32, label: &str) {
        let label = format!("{}-a{}-{}", self.job_id, attempt, label);
        if let Some(capture) = ops.capture(&label).await {
            self.result.captures.push(capture);
        }
    }

    fn succeed(&mut self, confirmations: Vec<String>) -> DriverResult {
        let mut result = std::mem::take(&mut self.result);
        result.success = true;
        result.submitted_record_ids = self
            .artifact
            .rows
            .iter()
            .map(|r| r.record_id.clone())
            .collect();
        result.records_submitted = result.submitted_record_ids.len();
        result.message = format!(
            "submitted {} records in {} attempt(s)",
            result.records_submitted, result.attempts
        );
        result.confirmation_numbers = confirmations;
        info!(
            job_id = %self.job_id,
            records = result.records_submitted,
            confirmations = ?result.confirmation_numbers,
            "Batch confirmed"
        );
        result
    }

    /// Never re-upload after confirm was clicked: the portal may already hold the batch
    fn abort_unconfirmed(&mut self, reason: String) -> DriverResult {
        error!(
            job_id = %self.job_id,
            records = self.artifact.record_count(),
            error = %reason,
            "Confirmation outcome unknown, manual check required"
        );
        let mut result = self.abort(format!("confirmation outcome unknown: {reason}"));
        result.outcome_unknown = true;
        result
    }

    fn abort(&mut self, reason: String) -> DriverResult {
        if !self.machine.state().is_terminal() {
            let _ = self.machine.transition(DriverState::Aborted);
        }
        let mut result = std::mem::take(&mut self.result);
        result.success = false;
        result.message = if result.errors.is_empty() {
            reason
        } else {
            format!(
                "{reason}; {} error rows across {} attempt(s)",
                result.errors.len(),
                result.attempts
            )
        };
        warn!(job_id = %self.job_id, message = %result.message, "Submission aborted");
        result
    }
}

/// `SubmissionDriver` backed by a live portal session per job
pub struct PortalSubmissionDriver {
    sessions: Arc<dyn PortalSessionFactory>,
}

impl PortalSubmissionDriver {
    pub fn new(sessions: Arc<dyn PortalSessionFactory>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SubmissionDriver for PortalSubmissionDriver {
    async fn submit(&self, request: DriverRequest) -> DriverResult {
        let mut ops = match self.sessions.open(request.descriptor, &request.config).await {
            Ok(ops) => ops,
            Err(e) => {
                warn!(job_id = %request.job_id, error = %e, "Could not open portal session");
                return DriverResult::failure(format!("could not open portal session: {e}"));
            }
        };
        let mut driver = PortalDriver::new(request);
        let result = driver.run(ops.as_mut()).await;
        ops.close().await;
        result
    }
}

pub mod mocks {
    use super::*;
    use crate::domain::PortalConfig;
    use crate::port::{CaptureRef, LoginReport, TableRow};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum PortalStep {
        Clean,
        Errors(Vec<TableRow>),
        UploadFails(PortalError),
        ValidationFails(PortalError),
    }

    #[derive(Debug, Default)]
    struct Script {
        logins: VecDeque<bool>,
        steps: VecDeque<PortalStep>,
        uploads: Vec<Artifact>,
        deletes: usize,
        confirms: usize,
        confirm_failures: VecDeque<PortalError>,
        closed: bool,
    }

    /// Scripted portal: queued login outcomes and per-upload validation results
    ///
    /// Logins succeed and validation comes back clean once the scripts run out.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedPortal {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedPortal {
        pub fn new(steps: impl IntoIterator<Item = PortalStep>) -> Self {
            let portal = Self::default();
            portal.script.lock().unwrap().steps = steps.into_iter().collect();
            portal
        }

        pub fn with_logins(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
            self.script.lock().unwrap().logins = outcomes.into_iter().collect();
            self
        }

        /// Errors returned by the next confirm clicks, after the click registers
        pub fn with_confirm_failures(self, failures: impl IntoIterator<Item = PortalError>) -> Self {
            self.script.lock().unwrap().confirm_failures = failures.into_iter().collect();
            self
        }

        /// Flat error-table rows `[row, reference, field, "Error", message]`
        pub fn errors(rows: &[(u32, &str, &str)]) -> PortalStep {
            PortalStep::Errors(
                rows.iter()
                    .map(|&(row, reference, message)| {
                        let row = row.to_string();
                        TableRow::new("", &[row.as_str(), reference, "", "Error", message])
                    })
                    .collect(),
            )
        }

        pub fn uploads(&self) -> Vec<Artifact> {
            self.script.lock().unwrap().uploads.clone()
        }

        pub fn deletes(&self) -> usize {
            self.script.lock().unwrap().deletes
        }

        pub fn confirms(&self) -> usize {
            self.script.lock().unwrap().confirms
        }

        pub fn is_closed(&self) -> bool {
            self.script.lock().unwrap().closed
        }

        fn current_step(&self) -> PortalStep {
            let script = self.script.lock().unwrap();
            script.steps.front().cloned().unwrap_or(PortalStep::Clean)
        }
    }

    #[async_trait]
    impl PortalOperations for ScriptedPortal {
        async fn login(&mut self) -> LoginReport {
            let ok = self.script.lock().unwrap().logins.pop_front().unwrap_or(true);
            if ok {
                LoginReport {
                    authenticated: true,
                    landed_url: Some("https://portal.test/dashboard".into()),
                    ..Default::default()
                }
            } else {
                LoginReport::failed("invalid credentials")
            }
        }

        async fn stage_upload(&mut self, artifact: &Artifact) -> Result<(), PortalError> {
            if let PortalStep::UploadFails(e) = self.current_step() {
                self.script.lock().unwrap().steps.pop_front();
                return Err(e);
            }
            self.script.lock().unwrap().uploads.push(artifact.clone());
            Ok(())
        }

        async fn await_validation(&mut self) -> Result<ValidationOutcome, PortalError> {
            let step = self.script.lock().unwrap().steps.pop_front();
            match step.unwrap_or(PortalStep::Clean) {
                PortalStep::Clean => Ok(ValidationOutcome::Clean),
                PortalStep::Errors(rows) => Ok(ValidationOutcome::Errors(rows)),
                PortalStep::UploadFails(e) | PortalStep::ValidationFails(e) => Err(e),
            }
        }

        async fn delete_batch(&mut self) -> Result<(), PortalError> {
            self.script.lock().unwrap().deletes += 1;
            Ok(())
        }

        async fn confirm_batch(&mut self) -> Result<Vec<String>, PortalError> {
            let mut script = self.script.lock().unwrap();
            script.confirms += 1;
            if let Some(e) = script.confirm_failures.pop_front() {
                return Err(e);
            }
            Ok(vec![format!("WOTC-{:05}", script.confirms)])
        }

        async fn capture(&mut self, label: &str) -> Option<CaptureRef> {
            Some(CaptureRef(format!("scripted://{label}")))
        }

        async fn close(&mut self) {
            self.script.lock().unwrap().closed = true;
        }
    }

    #[async_trait]
    impl PortalSessionFactory for ScriptedPortal {
        async fn open(
            &self,
            _descriptor: &'static JurisdictionDescriptor,
            _config: &PortalConfig,
        ) -> Result<Box<dyn PortalOperations>, PortalError> {
            Ok(Box::new(self.clone()))
        }
    }
}
