// Job Store Port (Interface)

use crate::domain::{JobId, JobStatus, QueueRecord, RecordTransition, SubmissionJob};
use crate::error::Result;
use async_trait::async_trait;

/// Durable queue of submission jobs and their bound queue records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<SubmissionJob>>;

    /// Queue records currently bound to a job, in the job's record order
    async fn find_records(&self, job_id: &JobId) -> Result<Vec<QueueRecord>>;

    /// Pending jobs whose `next_retry_at` is unset or not after `now`, oldest first
    async fn find_dispatchable(&self, now_millis: i64, limit: usize) -> Result<Vec<SubmissionJob>>;

    /// PENDING -> IN_PROGRESS compare-and-swap, flipping bound records in the same
    /// transaction. `false` means another worker got there first.
    async fn claim(&self, job_id: &JobId, now_millis: i64) -> Result<bool>;

    /// Persist the outcome of a run together with its record transitions
    ///
    /// Conditioned on the stored job still being IN_PROGRESS; `false` when it was not.
    async fn record_attempt(
        &self,
        job: &SubmissionJob,
        records: &[RecordTransition],
    ) -> Result<bool>;

    /// Jobs in `status` (all when `None`), newest first
    async fn find_by_status(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<SubmissionJob>>;
}

pub mod mocks {
    use super::*;
    use crate::domain::{RecordId, RecordStatus};
    use crate::error::AppError;
    use crate::port::transaction::{JobStoreTransaction, Transaction, TransactionalJobStore};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct State {
        jobs: HashMap<JobId, SubmissionJob>,
        records: HashMap<RecordId, QueueRecord>,
    }

    /// In-memory store with the same claim and conditional-update semantics as SQLite
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryJobStore {
        state: Arc<Mutex<State>>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record(&self, id: &str) -> Option<QueueRecord> {
            self.state.lock().unwrap().records.get(id).cloned()
        }

        pub fn job(&self, id: &str) -> Option<SubmissionJob> {
            self.state.lock().unwrap().jobs.get(id).cloned()
        }

        /// Overwrite a job as-is (test setup)
        pub fn put_job(&self, job: SubmissionJob) {
            self.state.lock().unwrap().jobs.insert(job.id.clone(), job);
        }

        /// Overwrite a record as-is (test setup)
        pub fn put_record(&self, record: QueueRecord) {
            self.state.lock().unwrap().records.insert(record.id.clone(), record);
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn find_by_id(&self, id: &JobId) -> Result<Option<SubmissionJob>> {
            Ok(self.state.lock().unwrap().jobs.get(id).cloned())
        }

        async fn find_records(&self, job_id: &JobId) -> Result<Vec<QueueRecord>> {
            let state = self.state.lock().unwrap();
            let Some(job) = state.jobs.get(job_id) else {
                return Ok(Vec::new());
            };
            Ok(job
                .record_ids
                .iter()
                .filter_map(|id| state.records.get(id))
                .filter(|r| r.assigned_job_id.as_ref() == Some(job_id))
                .cloned()
                .collect())
        }

        async fn find_dispatchable(
            &self,
            now_millis: i64,
            limit: usize,
        ) -> Result<Vec<SubmissionJob>> {
            let state = self.state.lock().unwrap();
            let mut due: Vec<_> = state
                .jobs
                .values()
                .filter(|j| j.is_due(now_millis))
                .cloned()
                .collect();
            due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            due.truncate(limit);
            Ok(due)
        }

        async fn claim(&self, job_id: &JobId, now_millis: i64) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            let Some(job) = state.jobs.get_mut(job_id) else {
                return Ok(false);
            };
            if job.start(now_millis).is_err() {
                return Ok(false);
            }
            let ids = job.record_ids.clone();
            for id in ids {
                if let Some(r) = state.records.get_mut(&id) {
                    let bound = r.assigned_job_id.as_ref() == Some(job_id);
                    if bound && r.status == RecordStatus::Ready {
                        r.status = RecordStatus::InProgress;
                        r.updated_at = now_millis;
                    }
                }
            }
            Ok(true)
        }

        async fn record_attempt(
            &self,
            job: &SubmissionJob,
            records: &[RecordTransition],
        ) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            match state.jobs.get(&job.id) {
                Some(stored) if stored.status == JobStatus::InProgress => {}
                _ => return Ok(false),
            }
            state.jobs.insert(job.id.clone(), job.clone());
            for t in records {
                if let Some(r) = state.records.get_mut(&t.record_id) {
                    let bound = r.assigned_job_id.as_ref() == Some(&job.id);
                    if !bound || r.status != RecordStatus::InProgress {
                        continue;
                    }
                    r.status = t.status;
                    r.updated_at = job.updated_at;
                    if t.status == RecordStatus::Failed {
                        r.failure_count += 1;
                        r.last_failure_reason = t.failure_reason.clone();
                    }
                }
            }
            Ok(true)
        }

        async fn find_by_status(
            &self,
            status: Option<JobStatus>,
            limit: usize,
        ) -> Result<Vec<SubmissionJob>> {
            let state = self.state.lock().unwrap();
            let mut jobs: Vec<_> = state
                .jobs
                .values()
                .filter(|j| status.map_or(true, |s| j.status == s))
                .cloned()
                .collect();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            jobs.truncate(limit);
            Ok(jobs)
        }
    }

    /// Buffered copy of the state, swapped in on commit
    struct InMemoryTransaction {
        shared: Arc<Mutex<State>>,
        working: State,
    }

    #[async_trait]
    impl Transaction for InMemoryTransaction {
        async fn commit(self: Box<Self>) -> Result<()> {
            *self.shared.lock().unwrap() = self.working;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl JobStoreTransaction for InMemoryTransaction {
        async fn find_record(&mut self, id: &RecordId) -> Result<Option<QueueRecord>> {
            Ok(self.working.records.get(id).cloned())
        }

        async fn job_status(&mut self, id: &JobId) -> Result<Option<JobStatus>> {
            Ok(self.working.jobs.get(id).map(|j| j.status))
        }

        async fn insert_job(&mut self, job: &SubmissionJob) -> Result<()> {
            if self.working.jobs.contains_key(&job.id) {
                return Err(AppError::Conflict(format!("job {} already exists", job.id)));
            }
            self.working.jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn bind_record(
            &mut self,
            record_id: &RecordId,
            job_id: &JobId,
            now_millis: i64,
        ) -> Result<()> {
            let record = self
                .working
                .records
                .entry(record_id.clone())
                .or_insert_with(|| QueueRecord {
                    id: record_id.clone(),
                    assigned_job_id: None,
                    status: RecordStatus::Ready,
                    failure_count: 0,
                    last_failure_reason: None,
                    updated_at: now_millis,
                });
            record.assigned_job_id = Some(job_id.clone());
            record.status = RecordStatus::Ready;
            record.updated_at = now_millis;
            Ok(())
        }
    }

    #[async_trait]
    impl TransactionalJobStore for InMemoryJobStore {
        async fn begin_transaction(&self) -> Result<Box<dyn JobStoreTransaction>> {
            let working = self.state.lock().unwrap().clone();
            Ok(Box::new(InMemoryTransaction {
                shared: self.state.clone(),
                working,
            }))
        }
    }
}
