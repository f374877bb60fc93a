// Enqueue use case
//
// Upstream hands over already-eligible record IDs; only format validity is checked here.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::job::DEFAULT_MAX_RETRIES;
use crate::domain::{jurisdiction, PortalConfigs, RecordId, RecordStatus, SubmissionJob};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, JobStoreTransaction, TimeProvider, Transaction, TransactionalJobStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub jurisdiction: String,
    pub employer_id: String,
    pub record_ids: Vec<RecordId>,
}

impl EnqueueRequest {
    pub fn new(
        jurisdiction: impl Into<String>,
        employer_id: impl Into<String>,
        record_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            employer_id: employer_id.into(),
            record_ids: record_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Known jurisdiction, non-empty, no duplicates, within the record ceiling
    pub fn validate(&self) -> Result<&'static crate::domain::JurisdictionDescriptor> {
        let descriptor = jurisdiction::lookup(&self.jurisdiction).ok_or_else(|| {
            AppError::Validation(format!("unknown jurisdiction '{}'", self.jurisdiction))
        })?;
        if self.employer_id.trim().is_empty() {
            return Err(AppError::Validation("employer id is required".into()));
        }
        if self.record_ids.is_empty() {
            return Err(AppError::Validation("at least one record id is required".into()));
        }
        if self.record_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::Validation("record ids must not be blank".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.record_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(AppError::Validation(format!("duplicate record id '{dup}'")));
        }
        if self.record_ids.len() > descriptor.record_ceiling {
            return Err(AppError::Validation(format!(
                "{} records exceeds the {} ceiling of {}",
                self.record_ids.len(),
                descriptor.code,
                descriptor.record_ceiling
            )));
        }
        Ok(descriptor)
    }
}

pub struct EnqueueService {
    store: Arc<dyn TransactionalJobStore>,
    ids: Arc<dyn IdProvider>,
    clock: Arc<dyn TimeProvider>,
    configs: Arc<PortalConfigs>,
}

impl EnqueueService {
    pub fn new(
        store: Arc<dyn TransactionalJobStore>,
        ids: Arc<dyn IdProvider>,
        clock: Arc<dyn TimeProvider>,
        configs: Arc<PortalConfigs>,
    ) -> Self {
        Self {
            store,
            ids,
            clock,
            configs,
        }
    }

    /// Create a pending job and bind its records in one transaction
    ///
    /// A record that is already submitted, or bound to a job that is not terminal, fails
    /// the whole request with `AppError::Conflict` and nothing is written.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<SubmissionJob> {
        let descriptor = request.validate()?;
        let max_retries = self
            .configs
            .get(descriptor.code)
            .map(|c| c.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let now = self.clock.now_millis();
        let job = SubmissionJob::new(
            self.ids.generate_id(),
            now,
            descriptor.code,
            request.employer_id.trim(),
            request.record_ids,
            max_retries,
        );

        let mut tx = self.store.begin_transaction().await?;
        if let Err(e) = Self::check_conflicts(tx.as_mut(), &job).await {
            tx.rollback().await?;
            warn!(jurisdiction = %job.jurisdiction_code, error = %e, "Enqueue rejected");
            return Err(e);
        }

        tx.insert_job(&job).await?;
        for record_id in &job.record_ids {
            tx.bind_record(record_id, &job.id, now).await?;
        }
        tx.commit().await?;

        info!(
            job_id = %job.id,
            jurisdiction = %job.jurisdiction_code,
            employer_id = %job.employer_id,
            records = job.record_ids.len(),
            "Job enqueued"
        );
        Ok(job)
    }

    async fn check_conflicts(tx: &mut dyn JobStoreTransaction, job: &SubmissionJob) -> Result<()> {
        for record_id in &job.record_ids {
            let Some(record) = tx.find_record(record_id).await? else {
                continue;
            };
            if record.status == RecordStatus::Submitted {
                return Err(AppError::Conflict(format!(
                    "record {record_id} was already submitted"
                )));
            }
            if let Some(bound_to) = &record.assigned_job_id {
                if let Some(status) = tx.job_status(bound_to).await? {
                    if !status.is_terminal() {
                        return Err(AppError::Conflict(format!(
                            "record {record_id} is bound to {status} job {bound_to}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
