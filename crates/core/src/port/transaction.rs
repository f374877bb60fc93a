// Transaction port for atomic operations

use crate::domain::{JobId, JobStatus, QueueRecord, RecordId, SubmissionJob};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional JobStore operations
#[async_trait]
pub trait TransactionalJobStore: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn JobStoreTransaction>>;
}

/// JobStore operations within a transaction (used by enqueue)
#[async_trait]
pub trait JobStoreTransaction: Transaction {
    async fn find_record(&mut self, id: &RecordId) -> Result<Option<QueueRecord>>;

    async fn job_status(&mut self, id: &JobId) -> Result<Option<JobStatus>>;

    async fn insert_job(&mut self, job: &SubmissionJob) -> Result<()>;

    /// Create the record as READY if unknown, then bind it to `job_id`
    async fn bind_record(&mut self, record_id: &RecordId, job_id: &JobId, now_millis: i64)
        -> Result<()>;
}
