// SMS gateway notifier (Twilio-style REST API)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use wotc_core::port::{JobNotification, Notifier, NotifyError};

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_CHARS: usize = 300;

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Clone, Deserialize)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("api_base", &self.api_base)
            .finish()
    }
}

pub struct SmsNotifier {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Result<Self, NotifyError> {
        if config.to.is_empty() {
            return Err(NotifyError::Config("sms needs at least one recipient".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(format!("sms client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    async fn send_one(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| NotifyError::Transport(format!("sms request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// First `MAX_BODY_CHARS` characters of the summary
pub(crate) fn sms_body(notification: &JobNotification) -> String {
    notification.summary().chars().take(MAX_BODY_CHARS).collect()
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn channel(&self) -> &'static str {
        "sms"
    }

    /// One message per recipient; the first failure is returned after all were tried
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        let body = sms_body(notification);
        let mut first_error = None;
        for to in &self.config.to {
            if let Err(e) = self.send_one(to, &body).await {
                warn!(job_id = %notification.job_id, error = %e, "SMS delivery failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(job_id = %notification.job_id, recipients = self.config.to.len(), "SMS sent");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::completed;
    use crate::test_server::serve_once;

    fn config(api_base: String) -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from: "+15550000000".into(),
            to: vec!["+15551112222".into()],
            api_base,
        }
    }

    #[tokio::test]
    async fn test_posts_form_with_basic_auth() {
        let (base, request) = serve_once(201, "{}").await;
        let notifier = SmsNotifier::new(config(base)).unwrap();

        notifier.notify(&completed()).await.unwrap();

        let request = request.await.unwrap();
        assert!(request
            .head
            .starts_with("POST /2010-04-01/Accounts/AC123/Messages.json "));
        assert!(request
            .header("authorization")
            .is_some_and(|v| v.starts_with("Basic ")));
        assert!(request.body.contains("To=%2B15551112222"));
        assert!(request.body.contains("Body="));
    }

    #[tokio::test]
    async fn test_gateway_error_is_returned() {
        let (base, _request) = serve_once(401, "bad credentials").await;
        let notifier = SmsNotifier::new(config(base)).unwrap();
        let err = notifier.notify(&completed()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 401, .. }));
    }

    #[test]
    fn test_body_is_capped() {
        let mut n = completed();
        n.error_message = Some("x".repeat(1000));
        assert_eq!(sms_body(&n).chars().count(), MAX_BODY_CHARS);
    }
}
