// Notification fan-out
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::port::{JobNotification, Notifier};

/// Sends each terminal-state event to every configured notifier concurrently
///
/// Delivery failures are logged and otherwise ignored.
#[derive(Default)]
pub struct NotificationHub {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationHub {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Returns the number of notifiers that accepted the event
    pub async fn publish(&self, notification: &JobNotification) -> usize {
        let results = join_all(self.notifiers.iter().map(|n| async move {
            (n.channel(), n.notify(notification).await)
        }))
        .await;

        let mut delivered = 0;
        for (channel, result) in results {
            match result {
                Ok(()) => {
                    delivered += 1;
                    debug!(job_id = %notification.job_id, channel, "Notification delivered");
                }
                Err(e) => warn!(
                    job_id = %notification.job_id,
                    channel,
                    error = %e,
                    "Notification failed"
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmissionJob;
    use crate::port::notifier::mocks::RecordingNotifier;

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_others() {
        let ok = Arc::new(RecordingNotifier::new());
        let bad = Arc::new(RecordingNotifier::failing());
        let hub = NotificationHub::new(vec![
            bad.clone() as Arc<dyn Notifier>,
            ok.clone() as Arc<dyn Notifier>,
        ]);

        let mut job = SubmissionJob::new("j", 0, "TX", "e", vec!["r".into()], 0);
        job.start(1).unwrap();
        job.fail(2, "automation disabled").unwrap();
        let delivered = hub.publish(&JobNotification::from_job(&job, 1)).await;

        assert_eq!(delivered, 1);
        assert_eq!(ok.sent().len(), 1);
        assert_eq!(bad.sent().len(), 1);
    }
}
