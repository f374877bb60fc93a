// WOTC Infrastructure - Notification adapters
// Implements: Notifier (webhook, email, sms)

mod email;
mod sms;
#[cfg(test)]
mod test_server;
mod webhook;

use std::sync::Arc;

use serde::Deserialize;
use wotc_core::port::{Notifier, NotifyError};

pub use email::{EmailConfig, EmailNotifier};
pub use sms::{SmsConfig, SmsNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier};

/// `[notifications]` section; every channel is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub sms: Option<SmsConfig>,
}

/// Build one notifier per configured channel
pub fn build_notifiers(config: &NotificationsConfig) -> Result<Vec<Arc<dyn Notifier>>, NotifyError> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(webhook) = &config.webhook {
        notifiers.push(Arc::new(WebhookNotifier::new(webhook.clone())?));
    }
    if let Some(email) = &config.email {
        notifiers.push(Arc::new(EmailNotifier::new(email.clone())?));
    }
    if let Some(sms) = &config.sms {
        notifiers.push(Arc::new(SmsNotifier::new(sms.clone())?));
    }
    Ok(notifiers)
}
