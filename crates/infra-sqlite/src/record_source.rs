// SQLite RecordSource
//
// Payloads are stored as JSON documents keyed by queue record ID. The CLI imports
// them; the orchestrator only reads.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;
use wotc_core::domain::{RecordId, SubmissionRecord};
use wotc_core::error::Result;
use wotc_core::port::RecordSource;

use crate::error::map_sqlx_error;

#[derive(Clone)]
pub struct SqliteRecordSource {
    pool: SqlitePool,
}

impl SqliteRecordSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the payload for `record.record_id`
    pub async fn upsert(&self, record: &SubmissionRecord, now_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO record_payloads (record_id, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (record_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.record_id)
        .bind(serde_json::to_string(record)?)
        .bind(now_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM record_payloads")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl RecordSource for SqliteRecordSource {
    async fn load(&self, ids: &[RecordId]) -> Result<Vec<SubmissionRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let payload: Option<String> =
                sqlx::query_scalar("SELECT payload FROM record_payloads WHERE record_id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
            let Some(payload) = payload else {
                continue;
            };
            match serde_json::from_str::<SubmissionRecord>(&payload) {
                Ok(record) => records.push(record),
                // Treated as absent; the job marks the record failed
                Err(e) => warn!(record_id = %id, error = %e, "Unreadable record payload"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn source() -> SqliteRecordSource {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRecordSource::new(pool)
    }

    fn record(id: &str) -> SubmissionRecord {
        let json = include_str!("../tests/fixtures/record.json").replace("REC_ID", id);
        serde_json::from_str(&json).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_load_in_request_order() {
        let source = source().await;
        source.upsert(&record("a"), 1).await.unwrap();
        source.upsert(&record("b"), 1).await.unwrap();

        let loaded = source
            .load(&["b".to_string(), "missing".to_string(), "a".to_string()])
            .await
            .unwrap();
        let ids: Vec<_> = loaded.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded[1], record("a"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload() {
        let source = source().await;
        let mut rec = record("a");
        source.upsert(&rec, 1).await.unwrap();
        rec.signer_name = Some("Sam Ortiz".into());
        source.upsert(&rec, 2).await.unwrap();

        assert_eq!(source.count().await.unwrap(), 1);
        let loaded = source.load(&["a".to_string()]).await.unwrap();
        assert_eq!(loaded[0].signer_name.as_deref(), Some("Sam Ortiz"));
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_skipped() {
        let source = source().await;
        sqlx::query("INSERT INTO record_payloads (record_id, payload, updated_at) VALUES ('x', '{', 1)")
            .execute(&source.pool)
            .await
            .unwrap();
        assert!(source.load(&["x".to_string()]).await.unwrap().is_empty());
    }
}
