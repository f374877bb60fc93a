//! Shared setup: SQLite store, record payloads, orchestrator wiring

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wotc_core::application::{
    EnqueueRequest, EnqueueService, NotificationHub, Orchestrator, OrchestratorConfig,
    RecoveryService,
};
use wotc_core::domain::{PortalConfig, PortalConfigs, SubmissionJob, SubmissionRecord};
use wotc_core::port::id_provider::mocks::SequentialIds;
use wotc_core::port::notifier::mocks::RecordingNotifier;
use wotc_core::port::time_provider::mocks::ManualClock;
use wotc_core::port::{Notifier, SubmissionDriver};
use wotc_infra_sqlite::{
    create_pool, run_migrations, SqliteJobStore, SqlitePool, SqliteRecordSource,
};

pub const START: i64 = 1_736_000_000_000;

pub fn record(id: &str) -> SubmissionRecord {
    let json = include_str!("../fixtures/record.json").replace("REC_ID", id);
    serde_json::from_str(&json).unwrap()
}

/// `rec-001` .. `rec-NNN`
pub fn record_ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("rec-{i:03}")).collect()
}

pub async fn memory_pool() -> SqlitePool {
    open_pool("sqlite::memory:").await
}

/// Fresh database file under the temp dir; returns its URL
pub fn file_db_url(tag: &str) -> String {
    let dir = std::env::temp_dir().join(format!("wotc-it-{}-{tag}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    format!("sqlite://{}", dir.join("store.db").display())
}

pub async fn open_pool(url: &str) -> SqlitePool {
    let pool = create_pool(url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub struct World {
    pub pool: SqlitePool,
    pub store: Arc<SqliteJobStore>,
    pub records: Arc<SqliteRecordSource>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub configs: Arc<PortalConfigs>,
    pub ids: Arc<SequentialIds>,
}

impl World {
    pub async fn new(pool: SqlitePool, configs: Vec<PortalConfig>) -> Self {
        Self {
            store: Arc::new(SqliteJobStore::new(pool.clone())),
            records: Arc::new(SqliteRecordSource::new(pool.clone())),
            pool,
            clock: Arc::new(ManualClock::new(START)),
            notifier: Arc::new(RecordingNotifier::new()),
            configs: Arc::new(PortalConfigs::new(configs)),
            ids: Arc::new(SequentialIds::default()),
        }
    }

    pub async fn import(&self, ids: &[String]) {
        for id in ids {
            self.records.upsert(&record(id), START).await.unwrap();
        }
    }

    pub async fn enqueue(&self, code: &str, ids: &[String]) -> SubmissionJob {
        EnqueueService::new(
            self.store.clone(),
            self.ids.clone(),
            self.clock.clone(),
            self.configs.clone(),
        )
        .enqueue(EnqueueRequest::new(code, "emp-1", ids.iter().cloned()))
        .await
        .unwrap()
    }

    pub fn hub(&self) -> Arc<NotificationHub> {
        Arc::new(NotificationHub::new(vec![
            self.notifier.clone() as Arc<dyn Notifier>
        ]))
    }

    pub fn orchestrator(&self, driver: Arc<dyn SubmissionDriver>, max_concurrent: usize) -> Orchestrator {
        Orchestrator::new(
            self.store.clone(),
            self.records.clone(),
            driver,
            self.configs.clone(),
            self.hub(),
            self.clock.clone(),
            OrchestratorConfig {
                poll_interval: Duration::from_millis(50),
                max_concurrent,
                sweep_every_polls: 0,
            },
        )
    }

    pub fn recovery(&self) -> RecoveryService {
        RecoveryService::new(
            self.store.clone(),
            self.clock.clone(),
            self.configs.clone(),
            self.hub(),
            None,
        )
    }
}
