// Staleness sweep
//
// A process that dies mid-job leaves it IN_PROGRESS forever. The sweep folds such jobs
// back through the normal failure accounting.
use crate::application::notify::NotificationHub;
use crate::application::orchestrator::RunningJobs;
use crate::application::reconcile::{apply_failure, failed_count, retain_in_progress};
use crate::application::retry::RetryPolicy;
use crate::domain::{JobStatus, PortalConfigs, RecordTransition, SubmissionJob};
use crate::port::{JobNotification, JobStore, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Three driver attempts at the five-minute validation wait plus login/confirm margin
pub const DEFAULT_STALE_AFTER_MS: i64 = 45 * 60 * 1000;

pub const STALE_REASON: &str = "stale in_progress job reclaimed";

/// Upper bound on jobs inspected per sweep
const SWEEP_BATCH: usize = 1_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub requeued: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.requeued + self.failed
    }
}

pub struct RecoveryService {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn TimeProvider>,
    configs: Arc<PortalConfigs>,
    notifications: Arc<NotificationHub>,
    stale_after_ms: i64,
}

impl RecoveryService {
    /// `stale_after_ms` defaults to 45 minutes
    pub fn new(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn TimeProvider>,
        configs: Arc<PortalConfigs>,
        notifications: Arc<NotificationHub>,
        stale_after_ms: Option<i64>,
    ) -> Self {
        Self {
            store,
            clock,
            configs,
            notifications,
            stale_after_ms: stale_after_ms.unwrap_or(DEFAULT_STALE_AFTER_MS),
        }
    }

    /// Reclaim IN_PROGRESS jobs started before `now - stale_after`
    pub async fn sweep_stale(&self) -> crate::error::Result<SweepReport> {
        self.sweep(None).await
    }

    /// Same as `sweep_stale`, leaving alone jobs this process is still running
    pub async fn sweep_stale_except(&self, local: &RunningJobs) -> crate::error::Result<SweepReport> {
        self.sweep(Some(local)).await
    }

    async fn sweep(&self, local: Option<&RunningJobs>) -> crate::error::Result<SweepReport> {
        let now = self.clock.now_millis();
        let cutoff = now - self.stale_after_ms;
        let in_progress = self
            .store
            .find_by_status(Some(JobStatus::InProgress), SWEEP_BATCH)
            .await?;

        let mut report = SweepReport::default();
        for mut job in in_progress {
            if local.is_some_and(|running| running.contains(&job.id)) {
                debug!(job_id = %job.id, "Job still running locally, not stale");
                continue;
            }
            let permanent = match job.started_at {
                Some(started_at) if started_at < cutoff => {
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        cutoff = %cutoff,
                        "Reclaiming stale job"
                    );
                    false
                }
                Some(_) => continue,
                None => {
                    warn!(job_id = %job.id, "IN_PROGRESS job without started_at, failing");
                    true
                }
            };

            let policy = RetryPolicy::for_config(self.configs.get(&job.jurisdiction_code));
            let transitions = apply_failure(&mut job, now, &policy, STALE_REASON, permanent, &[])?;
            let transitions = retain_in_progress(self.store.as_ref(), &job.id, transitions).await?;
            if !self.store.record_attempt(&job, &transitions).await? {
                // Finished normally between the read and the write
                continue;
            }

            if job.status == JobStatus::Failed {
                report.failed += 1;
                self.announce(&job, &transitions).await;
            } else {
                report.requeued += 1;
            }
        }

        info!(
            requeued = report.requeued,
            failed = report.failed,
            "Staleness sweep complete"
        );
        Ok(report)
    }

    async fn announce(&self, job: &SubmissionJob, transitions: &[RecordTransition]) {
        let notification = JobNotification::from_job(job, failed_count(transitions));
        self.notifications.publish(&notification).await;
    }
}
