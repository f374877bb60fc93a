// Running-job bookkeeping
//
// A slot is held for the lifetime of a job task and released on drop, so a panicking
// or erroring job can never leak one.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::domain::JobId;

#[derive(Default)]
struct Slots {
    running: Mutex<HashSet<JobId>>,
    idle: Notify,
}

#[derive(Clone, Default)]
pub struct RunningJobs {
    slots: Arc<Slots>,
}

impl RunningJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<JobId>> {
        self.slots
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.lock().contains(job_id)
    }

    /// `None` when `limit` slots are taken or the job already holds one
    pub fn try_acquire(&self, job_id: &JobId, limit: usize) -> Option<SlotGuard> {
        let mut running = self.lock();
        if running.len() >= limit || running.contains(job_id) {
            return None;
        }
        running.insert(job_id.clone());
        Some(SlotGuard {
            jobs: self.clone(),
            job_id: job_id.clone(),
        })
    }

    /// Resolves once no job holds a slot
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.slots.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct SlotGuard {
    jobs: RunningJobs,
    job_id: JobId,
}

impl SlotGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let empty = {
            let mut running = self.jobs.lock();
            running.remove(&self.job_id);
            running.is_empty()
        };
        if empty {
            self.jobs.slots.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_limit_and_duplicate() {
        let jobs = RunningJobs::new();
        let a = jobs.try_acquire(&"a".to_string(), 2).unwrap();
        assert!(jobs.try_acquire(&"a".to_string(), 2).is_none());
        let _b = jobs.try_acquire(&"b".to_string(), 2).unwrap();
        assert!(jobs.try_acquire(&"c".to_string(), 2).is_none());
        assert_eq!(jobs.count(), 2);

        drop(a);
        assert!(!jobs.contains("a"));
        assert!(jobs.try_acquire(&"c".to_string(), 2).is_some());
    }

    #[tokio::test]
    async fn test_wait_until_idle() {
        let jobs = RunningJobs::new();
        jobs.wait_until_idle().await;

        let slot = jobs.try_acquire(&"a".to_string(), 1).unwrap();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(slot);
        });
        jobs.wait_until_idle().await;
        assert_eq!(jobs.count(), 0);
        task.await.unwrap();
    }
}
