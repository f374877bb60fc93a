//! Dependency wiring (composition root)

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use wotc_core::application::{
    BrowserPortalFactory, EnqueueService, NotificationHub, Orchestrator, Pacer,
    PortalSubmissionDriver, RecoveryService,
};
use wotc_core::domain::PortalConfigs;
use wotc_core::port::{SystemTimeProvider, TimeProvider, UuidProvider};
use wotc_infra_sqlite::{
    create_pool, run_migrations, SqliteJobStore, SqlitePool, SqliteRecordSource,
};
use wotc_infra_webdriver::WebDriverLauncher;
use wotc_notify::build_notifiers;

use crate::settings::Settings;

/// Store, record source and shared collaborators for one database
pub struct Services {
    pub pool: SqlitePool,
    pub store: Arc<SqliteJobStore>,
    pub records: Arc<SqliteRecordSource>,
    pub configs: Arc<PortalConfigs>,
    pub notifications: Arc<NotificationHub>,
    pub clock: Arc<dyn TimeProvider>,
}

impl Services {
    /// Open the database and apply migrations
    pub async fn connect(settings: &Settings) -> Result<Self> {
        info!(database_url = %settings.database_url, "Opening job store");
        let pool = create_pool(&settings.database_url)
            .await
            .context("DB pool creation failed")?;
        run_migrations(&pool).await.context("Migration failed")?;

        let notifiers = build_notifiers(&settings.notifications)
            .context("Invalid notification settings")?;
        info!(
            channels = ?notifiers.iter().map(|n| n.channel()).collect::<Vec<_>>(),
            portals = settings.portals.len(),
            "Services wired"
        );

        Ok(Self {
            store: Arc::new(SqliteJobStore::new(pool.clone())),
            records: Arc::new(SqliteRecordSource::new(pool.clone())),
            pool,
            configs: Arc::new(settings.portal_configs()),
            notifications: Arc::new(NotificationHub::new(notifiers)),
            clock: Arc::new(SystemTimeProvider),
        })
    }

    pub fn recovery(&self, settings: &Settings) -> RecoveryService {
        RecoveryService::new(
            self.store.clone(),
            self.clock.clone(),
            self.configs.clone(),
            self.notifications.clone(),
            Some(settings.stale_after_ms()),
        )
    }

    pub fn enqueue(&self) -> EnqueueService {
        EnqueueService::new(
            self.store.clone(),
            Arc::new(UuidProvider),
            self.clock.clone(),
            self.configs.clone(),
        )
    }

    /// Orchestrator driving real browsers through the configured WebDriver server
    pub fn orchestrator(&self, settings: &Settings) -> Result<Orchestrator> {
        let launcher = WebDriverLauncher::new(&settings.webdriver_url, settings.launch_settings())
            .context("WebDriver client setup failed")?;
        let pacer = if settings.human_pacing {
            Pacer::human()
        } else {
            Pacer::disabled()
        };
        let sessions = Arc::new(BrowserPortalFactory::new(Arc::new(launcher), pacer));
        let driver = Arc::new(PortalSubmissionDriver::new(sessions));

        Ok(Orchestrator::new(
            self.store.clone(),
            self.records.clone(),
            driver,
            self.configs.clone(),
            self.notifications.clone(),
            self.clock.clone(),
            settings.orchestrator_config(),
        ))
    }
}
