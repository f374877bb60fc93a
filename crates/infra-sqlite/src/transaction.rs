// SQLite Transaction Implementation

use async_trait::async_trait;
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use wotc_core::domain::{JobId, JobStatus, QueueRecord, RecordId, SubmissionJob};
use wotc_core::error::Result;
use wotc_core::port::{JobStoreTransaction, Transaction};

use crate::error::map_sqlx_error;
use crate::job_store::RecordRow;

pub struct SqliteJobStoreTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteJobStoreTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteJobStoreTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobStoreTransaction for SqliteJobStoreTransaction {
    async fn find_record(&mut self, id: &RecordId) -> Result<Option<QueueRecord>> {
        let row: Option<RecordRow> = sqlx::query_as("SELECT * FROM queue_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn job_status(&mut self, id: &JobId) -> Result<Option<JobStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM submission_jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
        Ok(status.map(|s| s.parse::<JobStatus>()).transpose()?)
    }

    async fn insert_job(&mut self, job: &SubmissionJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO submission_jobs (
                id, jurisdiction_code, employer_id, record_ids, status,
                retry_count, max_retries, next_retry_at,
                confirmation_number, error_message, records_submitted,
                created_at, updated_at, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.jurisdiction_code)
        .bind(&job.employer_id)
        .bind(serde_json::to_string(&job.record_ids)?)
        .bind(job.status.as_str())
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.next_retry_at)
        .bind(&job.confirmation_number)
        .bind(&job.error_message)
        .bind(job.records_submitted)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn bind_record(
        &mut self,
        record_id: &RecordId,
        job_id: &JobId,
        now_millis: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_records (id, assigned_job_id, status, failure_count, updated_at)
            VALUES (?, ?, 'READY', 0, ?)
            ON CONFLICT (id) DO UPDATE SET
                assigned_job_id = excluded.assigned_job_id,
                status = 'READY',
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record_id)
        .bind(job_id)
        .bind(now_millis)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{create_pool, run_migrations, SqliteJobStore};
    use wotc_core::domain::{JobStatus, RecordStatus, SubmissionJob};
    use wotc_core::port::{JobStore, Transaction, TransactionalJobStore};

    async fn store() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool)
    }

    fn job(id: &str) -> SubmissionJob {
        SubmissionJob::new(id, 1_000, "TX", "emp-1", vec!["r1".into()], 3)
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store().await;
        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_job(&job("j1")).await.unwrap();
        tx.bind_record(&"r1".to_string(), &"j1".to_string(), 1_000)
            .await
            .unwrap();
        assert_eq!(
            tx.job_status(&"j1".to_string()).await.unwrap(),
            Some(JobStatus::Pending)
        );
        tx.rollback().await.unwrap();

        assert!(store.find_by_id(&"j1".to_string()).await.unwrap().is_none());
        assert!(store.find_record(&"r1".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bind_record_rebinds_existing() {
        let store = store().await;
        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_job(&job("j1")).await.unwrap();
        tx.insert_job(&job("j2")).await.unwrap();
        tx.bind_record(&"r1".to_string(), &"j1".to_string(), 1_000)
            .await
            .unwrap();
        tx.bind_record(&"r1".to_string(), &"j2".to_string(), 2_000)
            .await
            .unwrap();

        let record = tx.find_record(&"r1".to_string()).await.unwrap().unwrap();
        assert_eq!(record.assigned_job_id.as_deref(), Some("j2"));
        assert_eq!(record.status, RecordStatus::Ready);
        assert_eq!(record.updated_at, 2_000);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_to_unknown_job_violates_foreign_key() {
        let store = store().await;
        let mut tx = store.begin_transaction().await.unwrap();
        let err = tx
            .bind_record(&"r1".to_string(), &"nope".to_string(), 1_000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Foreign key"));
        tx.rollback().await.unwrap();
    }
}
