// JSON webhook notifier

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use wotc_core::port::{JobNotification, Notifier, NotifyError};

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 1024;

#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::Config("webhook url is required".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(format!("webhook client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        let mut req = self.client.post(&self.config.url).json(notification);
        if let Some(token) = &self.config.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| NotifyError::Transport(format!("webhook request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(job_id = %notification.job_id, status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}
