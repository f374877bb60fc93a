// Orchestrator - polling loop and per-job execution

pub mod constants;
mod panic_guard;
mod shutdown;
mod slots;

use constants::*;
pub use panic_guard::panic_message;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use slots::{RunningJobs, SlotGuard};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::notify::NotificationHub;
use crate::application::reconcile::{
    apply_failure, apply_success, failed_count, retain_in_progress, RecordFailure,
};
use crate::application::recovery::RecoveryService;
use crate::application::retry::RetryPolicy;
use crate::domain::{
    jurisdiction, JobId, JobStatus, PortalConfigs, RecordStatus, RecordTransition,
    SubmissionJob, SubmissionRecord,
};
use crate::encoding;
use crate::error::{AppError, Result};
use crate::port::{
    DriverRequest, JobNotification, JobStore, RecordSource, SubmissionDriver, TimeProvider,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    /// Jobs running at once; each holds one browser session
    pub max_concurrent: usize,
    /// Run the staleness sweep every N polls (0 disables it)
    pub sweep_every_polls: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            sweep_every_polls: DEFAULT_SWEEP_EVERY_POLLS,
        }
    }
}

/// Polls the job store, claims due jobs and runs each in an isolated task
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    records: Arc<dyn RecordSource>,
    driver: Arc<dyn SubmissionDriver>,
    configs: Arc<PortalConfigs>,
    notifications: Arc<NotificationHub>,
    clock: Arc<dyn TimeProvider>,
    config: OrchestratorConfig,
    running: RunningJobs,
    recovery: Option<Arc<RecoveryService>>,
}

/// Running loop; `stop` waits for in-flight jobs
pub struct OrchestratorHandle {
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
    running: RunningJobs,
}

impl OrchestratorHandle {
    pub fn shutdown_sender(&self) -> &ShutdownSender {
        &self.shutdown
    }

    pub async fn stop(self) {
        self.shutdown.shutdown();
        if let Err(e) = self.task.await {
            error!(error = %e, "Orchestrator loop ended abnormally");
        }
        let in_flight = self.running.count();
        if in_flight > 0 {
            info!(in_flight, "Waiting for running jobs to finish");
        }
        self.running.wait_until_idle().await;
        info!("Orchestrator stopped");
    }
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        records: Arc<dyn RecordSource>,
        driver: Arc<dyn SubmissionDriver>,
        configs: Arc<PortalConfigs>,
        notifications: Arc<NotificationHub>,
        clock: Arc<dyn TimeProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            records,
            driver,
            configs,
            notifications,
            clock,
            config,
            running: RunningJobs::new(),
            recovery: None,
        }
    }

    /// Sweep stale jobs from inside the polling loop
    pub fn with_recovery(mut self, recovery: Arc<RecoveryService>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub fn running(&self) -> &RunningJobs {
        &self.running
    }

    pub async fn wait_until_idle(&self) {
        self.running.wait_until_idle().await;
    }

    pub fn start(&self) -> OrchestratorHandle {
        let (shutdown, token) = shutdown_channel();
        let this = self.clone();
        let task = tokio::spawn(async move { this.run(token).await });
        OrchestratorHandle {
            shutdown,
            task,
            running: self.running.clone(),
        }
    }

    /// Poll until shutdown; never returns early on store errors
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Orchestrator started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => {
                    info!("Orchestrator interrupted while idle");
                    break;
                }
            }
            if shutdown.is_shutdown() {
                break;
            }
            polls += 1;

            if let Some(recovery) = &self.recovery {
                let every = self.config.sweep_every_polls;
                if every > 0 && polls % every == 0 {
                    if let Err(e) = recovery.sweep_stale_except(&self.running).await {
                        error!(error = %e, "Staleness sweep failed");
                    }
                }
            }

            if let Err(e) = self.poll_and_dispatch().await {
                error!(error = %e, "Poll failed");
            }
        }
        info!("Orchestrator polling stopped");
    }

    /// Claim as many due jobs as there are free slots; returns how many were started
    pub async fn poll_and_dispatch(&self) -> Result<usize> {
        let limit = self.config.max_concurrent;
        let free = limit.saturating_sub(self.running.count());
        if free == 0 {
            debug!(running = self.running.count(), "All slots busy");
            return Ok(0);
        }

        let now = self.clock.now_millis();
        let candidates = self.store.find_dispatchable(now, free).await?;
        let mut started = 0;
        for job in candidates {
            let Some(slot) = self.running.try_acquire(&job.id, limit) else {
                continue;
            };
            if !self.store.claim(&job.id, now).await? {
                debug!(job_id = %job.id, "Job claimed elsewhere");
                continue;
            }
            info!(
                job_id = %job.id,
                jurisdiction = %job.jurisdiction_code,
                records = job.record_ids.len(),
                retry_count = job.retry_count,
                "Claimed job"
            );
            self.spawn_job(slot);
            started += 1;
        }
        Ok(started)
    }

    fn spawn_job(&self, slot: SlotGuard) {
        let this = self.clone();
        tokio::spawn(async move {
            let job_id = slot.job_id().to_string();
            let runner = this.clone();
            let id = job_id.clone();
            // Inner task so a panic surfaces as a JoinError here
            let outcome = tokio::spawn(async move { runner.run_job(&id).await }).await;

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, permanent = e.is_permanent(), "Job errored");
                    Some((format!("unexpected error: {e}"), e.is_permanent()))
                }
                Err(join_err) => {
                    let message = panic_message(join_err);
                    error!(job_id = %job_id, error = %message, "Job task died");
                    Some((message, false))
                }
            };
            if let Some((message, permanent)) = failure {
                this.fail_unexpected(&job_id, &message, permanent).await;
            }
            drop(slot);
        });
    }

    /// Execute one claimed job end to end
    pub async fn run_job(&self, job_id: &JobId) -> Result<()> {
        let job = self
            .store
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
        if job.status != JobStatus::InProgress {
            warn!(job_id = %job.id, status = %job.status.as_str(), "Job not in progress, skipping");
            return Ok(());
        }

        let code = job.jurisdiction_code.clone();
        let Some(descriptor) = jurisdiction::lookup(&code) else {
            let message = format!("unknown jurisdiction '{code}'");
            return self.finish_failure(job, &message, true, &[]).await;
        };
        let config = match self.configs.get(&code) {
            Some(c) if c.automation_enabled => c.clone(),
            Some(_) => {
                let message = format!("portal automation disabled for {code}");
                return self.finish_failure(job, &message, true, &[]).await;
            }
            None => {
                let message = format!("no portal configured for {code}");
                return self.finish_failure(job, &message, true, &[]).await;
            }
        };

        let active: Vec<_> = self
            .store
            .find_records(&job.id)
            .await?
            .into_iter()
            .filter(|r| r.status == RecordStatus::InProgress)
            .map(|r| r.id)
            .collect();
        let mut payloads = self.records.load(&active).await?;
        payloads.sort_by_key(|p| active.iter().position(|id| *id == p.record_id));

        let mut failures: Vec<RecordFailure> = active
            .iter()
            .filter(|id| !payloads.iter().any(|p| p.record_id == **id))
            .map(|id| RecordFailure::new(id, "record payload not found"))
            .collect();

        let mut batch: Vec<SubmissionRecord> = Vec::with_capacity(payloads.len());
        for mut record in payloads {
            if record.effective_signer().is_none() {
                record.signer_name = config.default_signer().map(str::to_string);
            }
            let report = encoding::validate_record(descriptor, &record);
            if !report.valid {
                warn!(
                    job_id = %job.id,
                    record_id = %record.record_id,
                    errors = %report.summary(),
                    "Record failed validation"
                );
                failures.push(RecordFailure::new(&record.record_id, report.summary()));
                continue;
            }
            batch.push(record);
        }

        if batch.is_empty() {
            return self
                .finish_failure(job, "no valid records to submit", true, &failures)
                .await;
        }

        let artifact = match encoding::encode_with(descriptor, &batch) {
            Ok(artifact) => artifact,
            Err(e) => {
                let message = format!("encoding failed: {e}");
                return self.finish_failure(job, &message, true, &failures).await;
            }
        };
        info!(
            job_id = %job.id,
            jurisdiction = %code,
            records = batch.len(),
            file = %artifact.file_name,
            "Submitting batch"
        );

        let result = self
            .driver
            .submit(DriverRequest {
                job_id: job.id.clone(),
                descriptor,
                config,
                records: batch,
                artifact,
            })
            .await;

        if result.success {
            let mut job = job;
            let now = self.clock.now_millis();
            let transitions = apply_success(&mut job, now, &result, &failures)?;
            return self.persist(&job, transitions).await;
        }

        failures.extend(result.rejected_rows.iter().filter_map(|row| {
            row.record_id
                .as_ref()
                .map(|id| RecordFailure::new(id, row.reasons.join("; ")))
        }));
        let failed: HashSet<&str> = failures.iter().map(|f| f.record_id.as_str()).collect();
        // Nothing left to retry with, or the portal may already hold the batch
        let permanent =
            result.outcome_unknown || active.iter().all(|id| failed.contains(id.as_str()));
        self.finish_failure(job, &result.message, permanent, &failures)
            .await
    }

    async fn finish_failure(
        &self,
        mut job: SubmissionJob,
        message: &str,
        permanent: bool,
        failures: &[RecordFailure],
    ) -> Result<()> {
        let now = self.clock.now_millis();
        let policy = RetryPolicy::for_config(self.configs.get(&job.jurisdiction_code));
        let transitions = apply_failure(&mut job, now, &policy, message, permanent, failures)?;
        self.persist(&job, transitions).await
    }

    async fn persist(&self, job: &SubmissionJob, transitions: Vec<RecordTransition>) -> Result<()> {
        let transitions = retain_in_progress(self.store.as_ref(), &job.id, transitions).await?;
        if !self.store.record_attempt(job, &transitions).await? {
            warn!(job_id = %job.id, "Job no longer in progress, outcome discarded");
            return Ok(());
        }

        match job.status {
            JobStatus::Completed => info!(
                job_id = %job.id,
                records_submitted = job.records_submitted.unwrap_or(0),
                confirmation = job.confirmation_number.as_deref().unwrap_or(""),
                "Job completed"
            ),
            JobStatus::Pending => info!(
                job_id = %job.id,
                retry_count = job.retry_count,
                next_retry_at = job.next_retry_at.unwrap_or(0),
                error = job.error_message.as_deref().unwrap_or(""),
                "Job requeued"
            ),
            _ => warn!(
                job_id = %job.id,
                error = job.error_message.as_deref().unwrap_or(""),
                "Job failed"
            ),
        }

        if job.status.is_terminal() {
            let notification = JobNotification::from_job(job, failed_count(&transitions));
            self.notifications.publish(&notification).await;
        }
        Ok(())
    }

    /// Fold a panic or unexpected error into the normal failure accounting
    async fn fail_unexpected(&self, job_id: &JobId, message: &str, permanent: bool) {
        let job = match self.store.find_by_id(job_id).await {
            Ok(Some(job)) if job.status == JobStatus::InProgress => job,
            Ok(_) => return,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Could not reload job after failure");
                return;
            }
        };
        if let Err(e) = self.finish_failure(job, message, permanent, &[]).await {
            error!(job_id = %job_id, error = %e, "Could not record job failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PortalConfig, QueueRecord};
    use crate::encoding::fixtures;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::notifier::mocks::RecordingNotifier;
    use crate::port::record_source::mocks::InMemoryRecordSource;
    use crate::port::submission_driver::mocks::{DriverBehavior, ScriptedDriver};
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::{JobStoreTransaction, Notifier, Transaction, TransactionalJobStore};

    const START: i64 = 1_736_000_000_000;

    struct Harness {
        store: InMemoryJobStore,
        driver: Arc<ScriptedDriver>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        orchestrator: Orchestrator,
    }

    fn harness(driver: ScriptedDriver, records: Vec<SubmissionRecord>, max_concurrent: usize) -> Harness {
        harness_with(driver, records, max_concurrent, vec![PortalConfig::new("AZ", "https://az.test")])
    }

    fn harness_with(
        driver: ScriptedDriver,
        records: Vec<SubmissionRecord>,
        max_concurrent: usize,
        configs: Vec<PortalConfig>,
    ) -> Harness {
        harness_with_source(
            driver,
            Arc::new(InMemoryRecordSource::new(records)),
            max_concurrent,
            configs,
        )
    }

    fn harness_with_source(
        driver: ScriptedDriver,
        records: Arc<dyn RecordSource>,
        max_concurrent: usize,
        configs: Vec<PortalConfig>,
    ) -> Harness {
        let store = InMemoryJobStore::new();
        let driver = Arc::new(driver);
        let clock = Arc::new(ManualClock::new(START));
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = Orchestrator::new(
            Arc::new(store.clone()),
            records,
            driver.clone(),
            Arc::new(PortalConfigs::new(configs)),
            Arc::new(NotificationHub::new(vec![notifier.clone() as Arc<dyn Notifier>])),
            clock.clone(),
            OrchestratorConfig {
                poll_interval: Duration::from_millis(100),
                max_concurrent,
                sweep_every_polls: 0,
            },
        );
        Harness {
            store,
            driver,
            clock,
            notifier,
            orchestrator,
        }
    }

    async fn seed(store: &InMemoryJobStore, id: &str, code: &str, record_ids: &[&str], max_retries: i32) {
        let ids: Vec<String> = record_ids.iter().map(|s| s.to_string()).collect();
        let job = SubmissionJob::new(id, START, code, "emp-1", ids.clone(), max_retries);
        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_job(&job).await.unwrap();
        for r in &ids {
            tx.bind_record(r, &job.id, START).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn record(store: &InMemoryJobStore, id: &str) -> QueueRecord {
        store.record(id).unwrap()
    }

    async fn run_once(h: &Harness) -> usize {
        let started = h.orchestrator.poll_and_dispatch().await.unwrap();
        h.orchestrator.wait_until_idle().await;
        started
    }

    #[tokio::test]
    async fn test_successful_run_submits_records_and_notifies() {
        let h = harness(ScriptedDriver::accept_all(), fixtures::records(3), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002", "rec-003"], 3).await;

        assert_eq!(run_once(&h).await, 1);

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.records_submitted, Some(3));
        assert_eq!(job.confirmation_number.as_deref(), Some("CONF-job-1"));
        for id in ["rec-001", "rec-002", "rec-003"] {
            assert_eq!(record(&h.store, id).status, RecordStatus::Submitted);
        }
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, JobStatus::Completed);

        // Default signer from config is not needed: employer has one
        let request = &h.driver.requests()[0];
        assert_eq!(request.artifact.record_count(), 3);
    }

    #[tokio::test]
    async fn test_partial_rejection_completes_with_failed_record() {
        let driver = ScriptedDriver::new([DriverBehavior::Reject(vec![(
            "rec-002".into(),
            "Invalid SSN".into(),
        )])]);
        let h = harness(driver, fixtures::records(3), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002", "rec-003"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.records_submitted, Some(2));
        assert_eq!(job.error_message.as_deref(), Some("1 of 3 records not submitted"));
        let rejected = record(&h.store, "rec-002");
        assert_eq!(rejected.status, RecordStatus::Failed);
        assert_eq!(rejected.last_failure_reason.as_deref(), Some("Invalid SSN"));
        assert_eq!(h.notifier.sent()[0].records_failed, 1);
    }

    #[tokio::test]
    async fn test_driver_failure_requeues_with_backoff() {
        let driver = ScriptedDriver::new([DriverBehavior::Fail("portal down".into())]);
        let h = harness(driver, fixtures::records(2), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.next_retry_at, Some(START + 300_000));
        assert_eq!(job.error_message.as_deref(), Some("portal down"));
        assert_eq!(record(&h.store, "rec-001").status, RecordStatus::Ready);
        assert!(h.notifier.sent().is_empty());

        // Not due yet
        assert_eq!(run_once(&h).await, 0);
        h.clock.advance(300_000);
        assert_eq!(run_once(&h).await, 1);
        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 2);
        assert_eq!(job.next_retry_at, Some(START + 300_000 + 600_000));
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_and_notify() {
        let driver = ScriptedDriver::new([DriverBehavior::Fail("portal down".into())]);
        let h = harness(driver, fixtures::records(1), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 0).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let rec = record(&h.store, "rec-001");
        assert_eq!(rec.status, RecordStatus::Failed);
        assert_eq!(rec.failure_count, 1);
        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(h.notifier.sent()[0].records_failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_confirmation_fails_without_retry() {
        let driver = ScriptedDriver::new([DriverBehavior::Unconfirmed(
            "confirmation outcome unknown: timed out".into(),
        )]);
        let h = harness(driver, fixtures::records(2), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);
        assert!(job.error_message.unwrap().contains("confirmation outcome unknown"));
        assert_eq!(record(&h.store, "rec-001").status, RecordStatus::Failed);

        // Not dispatched again
        h.clock.advance(3_600_000);
        assert_eq!(run_once(&h).await, 0);
        assert_eq!(h.driver.calls(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_leaves_locally_running_job_alone() {
        let driver = ScriptedDriver::new([DriverBehavior::Slow(Duration::from_millis(200))]);
        let h = harness(driver, fixtures::records(1), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        assert_eq!(h.orchestrator.poll_and_dispatch().await.unwrap(), 1);

        // Past the stale threshold while the driver is still busy
        h.clock.advance(46 * 60_000);
        let recovery = RecoveryService::new(
            Arc::new(h.store.clone()),
            h.clock.clone(),
            Arc::new(PortalConfigs::default()),
            Arc::new(NotificationHub::default()),
            None,
        );
        let report = recovery
            .sweep_stale_except(h.orchestrator.running())
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(h.store.job("job-1").unwrap().status, JobStatus::InProgress);

        h.orchestrator.wait_until_idle().await;
        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.confirmation_number.is_some());
        assert_eq!(run_once(&h).await, 0);
        assert_eq!(h.driver.calls(), 1);
    }

    /// Record source whose every load fails with the given error
    struct BrokenRecordSource(fn() -> AppError);

    #[async_trait::async_trait]
    impl RecordSource for BrokenRecordSource {
        async fn load(&self, _ids: &[String]) -> Result<Vec<SubmissionRecord>> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn test_unexpected_error_permanence_decides_retry() {
        let configs = || vec![PortalConfig::new("AZ", "https://az.test")];
        let h = harness_with_source(
            ScriptedDriver::accept_all(),
            Arc::new(BrokenRecordSource(|| AppError::Config("payload schema mismatch".into()))),
            2,
            configs(),
        );
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;
        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);

        let h = harness_with_source(
            ScriptedDriver::accept_all(),
            Arc::new(BrokenRecordSource(|| AppError::Database("database is locked".into()))),
            2,
            configs(),
        );
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;
        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(h.driver.calls(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_requeued() {
        let driver = ScriptedDriver::new([
            DriverBehavior::Panic("browser crashed".into()),
            DriverBehavior::AcceptAll,
        ]);
        let h = harness(driver, fixtures::records(1), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.unwrap().contains("browser crashed"));
        assert_eq!(h.orchestrator.running().count(), 0);

        h.clock.advance(300_000);
        assert_eq!(run_once(&h).await, 1);
        assert_eq!(h.store.job("job-1").unwrap().status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let driver = ScriptedDriver::new([DriverBehavior::Slow(Duration::from_secs(10))]);
        let mut records = fixtures::records(2);
        records.push(fixtures::record("other-1"));
        let h = harness(driver, records, 1);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        seed(&h.store, "job-2", "AZ", &["other-1"], 3).await;

        assert_eq!(h.orchestrator.poll_and_dispatch().await.unwrap(), 1);
        assert_eq!(h.orchestrator.poll_and_dispatch().await.unwrap(), 0);
        assert_eq!(h.orchestrator.running().count(), 1);

        h.orchestrator.wait_until_idle().await;
        assert_eq!(run_once(&h).await, 1);
        assert_eq!(h.driver.calls(), 2);
        for id in ["job-1", "job-2"] {
            assert_eq!(h.store.job(id).unwrap().status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_disabled_automation_fails_without_retry() {
        let mut config = PortalConfig::new("AZ", "https://az.test");
        config.automation_enabled = false;
        let h = harness_with(ScriptedDriver::accept_all(), fixtures::records(1), 2, vec![config]);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.error_message.as_deref(), Some("portal automation disabled for AZ"));
        assert_eq!(h.driver.calls(), 0);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_config_fails_permanently() {
        let h = harness_with(ScriptedDriver::accept_all(), fixtures::records(1), 2, vec![]);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("no portal configured for AZ"));
    }

    #[tokio::test]
    async fn test_invalid_and_missing_records_are_excluded() {
        let mut records = fixtures::records(2);
        records[1].employee.ssn = "12345".into();
        let h = harness(ScriptedDriver::accept_all(), records, 2);
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002", "rec-404"], 3).await;
        run_once(&h).await;

        let request = &h.driver.requests()[0];
        assert_eq!(request.records.len(), 1);
        assert_eq!(request.records[0].record_id, "rec-001");

        assert_eq!(h.store.job("job-1").unwrap().status, JobStatus::Completed);
        assert_eq!(record(&h.store, "rec-001").status, RecordStatus::Submitted);
        let invalid = record(&h.store, "rec-002");
        assert_eq!(invalid.status, RecordStatus::Failed);
        assert!(invalid.last_failure_reason.unwrap().contains("SSN"));
        assert_eq!(
            record(&h.store, "rec-404").last_failure_reason.as_deref(),
            Some("record payload not found")
        );
    }

    #[tokio::test]
    async fn test_no_valid_records_fails_permanently() {
        let mut records = fixtures::records(1);
        records[0].employee.ssn = String::new();
        let h = harness(ScriptedDriver::accept_all(), records, 2);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;

        let job = h.store.job("job-1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);
        assert_eq!(h.driver.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_signer_fills_missing_signer() {
        let mut records = fixtures::records(1);
        records[0].employer.authorized_signer = None;
        let mut config = PortalConfig::new("AZ", "https://az.test");
        config.signer_candidates = vec!["Dana Cruz".into(), "Eli Moss".into()];
        let h = harness_with(ScriptedDriver::accept_all(), records, 2, vec![config]);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;
        run_once(&h).await;

        let request = &h.driver.requests()[0];
        assert_eq!(request.records[0].signer_name.as_deref(), Some("Dana Cruz"));
        assert_eq!(request.artifact.rows[0].signer.as_deref(), Some("Dana Cruz"));
    }

    #[tokio::test]
    async fn test_rejected_records_stay_failed_across_retry() {
        // Driver gives up but reports one removed row; the retry must not resubmit it
        let h = harness(
            ScriptedDriver::new([DriverBehavior::Fail("portal down".into())]),
            fixtures::records(2),
            2,
        );
        seed(&h.store, "job-1", "AZ", &["rec-001", "rec-002"], 3).await;
        h.store.claim(&"job-1".to_string(), START).await.unwrap();

        let mut job = h.store.job("job-1").unwrap();
        let policy = RetryPolicy::new(1_000);
        let transitions = apply_failure(
            &mut job,
            START,
            &policy,
            "portal down",
            false,
            &[RecordFailure::new("rec-002", "Invalid SSN")],
        )
        .unwrap();
        assert!(h.store.record_attempt(&job, &transitions).await.unwrap());

        h.clock.advance(1_000);
        assert_eq!(run_once(&h).await, 1);
        let request = &h.driver.requests()[0];
        assert_eq!(request.records.len(), 1);
        assert_eq!(request.records[0].record_id, "rec-001");
        assert_eq!(record(&h.store, "rec-002").status, RecordStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_waits_for_in_flight() {
        let driver = ScriptedDriver::new([DriverBehavior::Slow(Duration::from_secs(30))]);
        let h = harness(driver, fixtures::records(1), 2);
        seed(&h.store, "job-1", "AZ", &["rec-001"], 3).await;

        let handle = h.orchestrator.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(h.orchestrator.running().count(), 1);
        handle.stop().await;

        assert_eq!(h.orchestrator.running().count(), 0);
        assert_eq!(h.store.job("job-1").unwrap().status, JobStatus::Completed);
    }
}
