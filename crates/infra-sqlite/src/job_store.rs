// SQLite JobStore Implementation

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use wotc_core::domain::{
    JobId, JobStatus, QueueRecord, RecordId, RecordStatus, RecordTransition, SubmissionJob,
};
use wotc_core::error::Result;
use wotc_core::port::{JobStore, JobStoreTransaction, TransactionalJobStore};

use crate::error::map_sqlx_error;
use crate::transaction::SqliteJobStoreTransaction;

#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Queue record by ID, bound or not
    pub async fn find_record(&self, id: &RecordId) -> Result<Option<QueueRecord>> {
        let row: Option<RecordRow> = sqlx::query_as("SELECT * FROM queue_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(RecordRow::into_record).transpose()
    }

    /// Job counts keyed by status
    pub async fn count_by_status(&self) -> Result<Vec<(JobStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM submission_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(status, count)| -> Result<(JobStatus, i64)> {
                Ok((status.parse::<JobStatus>()?, count))
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<SubmissionJob>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM submission_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(JobRow::into_job).transpose()
    }

    async fn find_records(&self, job_id: &JobId) -> Result<Vec<QueueRecord>> {
        let Some(job) = self.find_by_id(job_id).await? else {
            return Ok(Vec::new());
        };

        let rows: Vec<RecordRow> =
            sqlx::query_as("SELECT * FROM queue_records WHERE assigned_job_id = ?")
                .bind(job_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let mut records: Vec<(usize, QueueRecord)> = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            if let Some(pos) = job.record_ids.iter().position(|id| *id == record.id) {
                records.push((pos, record));
            }
        }
        records.sort_by_key(|(pos, _)| *pos);
        Ok(records.into_iter().map(|(_, r)| r).collect())
    }

    async fn find_dispatchable(&self, now_millis: i64, limit: usize) -> Result<Vec<SubmissionJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM submission_jobs
            WHERE status = 'PENDING'
              AND (next_retry_at IS NULL OR next_retry_at <= ?)
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(now_millis)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn claim(&self, job_id: &JobId, now_millis: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let claimed = sqlx::query(
            r#"
            UPDATE submission_jobs
            SET status = 'IN_PROGRESS', started_at = ?, updated_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(now_millis)
        .bind(now_millis)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            debug!(job_id = %job_id, "Claim lost");
            return Ok(false);
        }

        let flipped = sqlx::query(
            r#"
            UPDATE queue_records
            SET status = 'IN_PROGRESS', updated_at = ?
            WHERE assigned_job_id = ? AND status = 'READY'
            "#,
        )
        .bind(now_millis)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(job_id = %job_id, records = flipped, "Job claimed");
        Ok(true)
    }

    async fn record_attempt(
        &self,
        job: &SubmissionJob,
        records: &[RecordTransition],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE submission_jobs
            SET status = ?, retry_count = ?, max_retries = ?, next_retry_at = ?,
                confirmation_number = ?, error_message = ?, records_submitted = ?,
                updated_at = ?, started_at = ?, finished_at = ?
            WHERE id = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.next_retry_at)
        .bind(&job.confirmation_number)
        .bind(&job.error_message)
        .bind(job.records_submitted)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(false);
        }

        for t in records {
            let query = if t.status == RecordStatus::Failed {
                sqlx::query(
                    r#"
                    UPDATE queue_records
                    SET status = ?, updated_at = ?,
                        failure_count = failure_count + 1, last_failure_reason = ?
                    WHERE id = ? AND assigned_job_id = ? AND status = 'IN_PROGRESS'
                    "#,
                )
                .bind(t.status.as_str())
                .bind(job.updated_at)
                .bind(&t.failure_reason)
            } else {
                sqlx::query(
                    r#"
                    UPDATE queue_records
                    SET status = ?, updated_at = ?
                    WHERE id = ? AND assigned_job_id = ? AND status = 'IN_PROGRESS'
                    "#,
                )
                .bind(t.status.as_str())
                .bind(job.updated_at)
            };
            query
                .bind(&t.record_id)
                .bind(&job.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn find_by_status(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<SubmissionJob>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => sqlx::query_as(
                "SELECT * FROM submission_jobs WHERE status = ? ORDER BY created_at DESC LIMIT ?",
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as("SELECT * FROM submission_jobs ORDER BY created_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[async_trait]
impl TransactionalJobStore for SqliteJobStore {
    async fn begin_transaction(&self) -> Result<Box<dyn JobStoreTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteJobStoreTransaction::new(tx)))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    id: String,
    jurisdiction_code: String,
    employer_id: String,
    record_ids: String, // JSON array
    status: String,
    retry_count: i32,
    max_retries: i32,
    next_retry_at: Option<i64>,
    confirmation_number: Option<String>,
    error_message: Option<String>,
    records_submitted: Option<i32>,
    created_at: i64,
    updated_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
}

impl JobRow {
    pub(crate) fn into_job(self) -> Result<SubmissionJob> {
        Ok(SubmissionJob {
            record_ids: serde_json::from_str(&self.record_ids)?,
            status: self.status.parse()?,
            id: self.id,
            jurisdiction_code: self.jurisdiction_code,
            employer_id: self.employer_id,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            next_retry_at: self.next_retry_at,
            confirmation_number: self.confirmation_number,
            error_message: self.error_message,
            records_submitted: self.records_submitted,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    id: String,
    assigned_job_id: Option<String>,
    status: String,
    failure_count: i32,
    last_failure_reason: Option<String>,
    updated_at: i64,
}

impl RecordRow {
    pub(crate) fn into_record(self) -> Result<QueueRecord> {
        Ok(QueueRecord {
            status: self.status.parse()?,
            id: self.id,
            assigned_job_id: self.assigned_job_id,
            failure_count: self.failure_count,
            last_failure_reason: self.last_failure_reason,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use std::sync::Arc;
    use wotc_core::port::Transaction;

    const NOW: i64 = 1_700_000_000_000;

    async fn setup_test_db() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool)
    }

    async fn seed(store: &SqliteJobStore, id: &str, created_at: i64, records: &[&str]) -> SubmissionJob {
        let job = SubmissionJob::new(
            id,
            created_at,
            "AZ",
            "emp-1",
            records.iter().map(|r| r.to_string()).collect(),
            3,
        );
        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_job(&job).await.unwrap();
        for r in &job.record_ids {
            tx.bind_record(r, &job.id, created_at).await.unwrap();
        }
        tx.commit().await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = setup_test_db().await;
        seed(&store, "job-1", NOW, &["r2", "r1", "r3"]).await;

        let job = store.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.record_ids, vec!["r2", "r1", "r3"]);

        let records = store.find_records(&job.id).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1", "r3"]);
        assert!(records.iter().all(|r| r.status == RecordStatus::Ready));

        assert!(store.find_by_id(&"missing".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_job_is_conflict() {
        let store = setup_test_db().await;
        let job = seed(&store, "job-1", NOW, &["r1"]).await;

        let mut tx = store.begin_transaction().await.unwrap();
        let err = tx.insert_job(&job).await.unwrap_err();
        assert!(matches!(err, wotc_core::AppError::Conflict(_)));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatchable_respects_backoff_and_order() {
        let store = setup_test_db().await;
        seed(&store, "newer", NOW + 10, &["a"]).await;
        seed(&store, "older", NOW, &["b"]).await;
        let mut delayed = seed(&store, "delayed", NOW - 10, &["c"]).await;

        assert!(store.claim(&delayed.id, NOW).await.unwrap());
        delayed.start(NOW).unwrap();
        delayed.schedule_retry(NOW, NOW + 60_000, "portal down").unwrap();
        assert!(store.record_attempt(&delayed, &[]).await.unwrap());

        let due = store.find_dispatchable(NOW + 100, 10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);

        let due = store.find_dispatchable(NOW + 60_000, 10).await.unwrap();
        assert_eq!(due[0].id, "delayed");
        assert_eq!(due[0].retry_count, 1);

        let due = store.find_dispatchable(NOW + 60_000, 1).await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_and_flips_records() {
        let store = setup_test_db().await;
        let job = seed(&store, "job-1", NOW, &["r1", "r2"]).await;

        assert!(store.claim(&job.id, NOW + 5).await.unwrap());
        assert!(!store.claim(&job.id, NOW + 6).await.unwrap());
        assert!(!store.claim(&"ghost".to_string(), NOW).await.unwrap());

        let stored = store.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::InProgress);
        assert_eq!(stored.started_at, Some(NOW + 5));

        let records = store.find_records(&job.id).await.unwrap();
        assert!(records.iter().all(|r| r.status == RecordStatus::InProgress));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let dir = std::env::temp_dir().join(format!("wotc-claim-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let url = format!("sqlite://{}", dir.join("claims.db").display());
        let _ = std::fs::remove_file(dir.join("claims.db"));

        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = Arc::new(SqliteJobStore::new(pool));
        let job = seed(&store, "job-1", NOW, &["r1"]).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let id = job.id.clone();
            handles.push(tokio::spawn(async move { store.claim(&id, NOW + i).await }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        store.pool().close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_record_attempt_applies_transitions() {
        let store = setup_test_db().await;
        let mut job = seed(&store, "job-1", NOW, &["r1", "r2", "r3"]).await;
        assert!(store.claim(&job.id, NOW).await.unwrap());
        job.start(NOW).unwrap();
        job.complete(NOW + 1_000, Some("123456".into()), 2).unwrap();

        let transitions = vec![
            RecordTransition::submitted("r1"),
            RecordTransition::submitted("r2"),
            RecordTransition::failed("r3", "row 4: invalid SSN"),
        ];
        assert!(store.record_attempt(&job, &transitions).await.unwrap());

        let stored = store.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.confirmation_number.as_deref(), Some("123456"));
        assert_eq!(stored.records_submitted, Some(2));

        let r3 = store.find_record(&"r3".to_string()).await.unwrap().unwrap();
        assert_eq!(r3.status, RecordStatus::Failed);
        assert_eq!(r3.failure_count, 1);
        assert_eq!(r3.last_failure_reason.as_deref(), Some("row 4: invalid SSN"));
        let r1 = store.find_record(&"r1".to_string()).await.unwrap().unwrap();
        assert_eq!(r1.status, RecordStatus::Submitted);

        // A second write against a finished job is refused
        assert!(!store.record_attempt(&job, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_status_and_counts() {
        let store = setup_test_db().await;
        seed(&store, "a", NOW, &["r1"]).await;
        seed(&store, "b", NOW + 1, &["r2"]).await;
        store.claim(&"a".to_string(), NOW).await.unwrap();

        let pending = store.find_by_status(Some(JobStatus::Pending), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");

        let all = store.find_by_status(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let counts = store.count_by_status().await.unwrap();
        assert!(counts.contains(&(JobStatus::InProgress, 1)));
        assert!(counts.contains(&(JobStatus::Pending, 1)));
    }
}
