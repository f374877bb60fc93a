// Per-jurisdiction portal configuration (read-only at runtime)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::job::DEFAULT_MAX_RETRIES;

fn default_true() -> bool {
    true
}

fn default_max_retries() -> i32 {
    DEFAULT_MAX_RETRIES
}

fn default_backoff_base_secs() -> u64 {
    300
}

fn default_validation_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub jurisdiction: String,
    pub portal_url: String,
    #[serde(default)]
    pub credentials: PortalCredentials,
    #[serde(default = "default_true")]
    pub automation_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Base of the exponential retry backoff
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Ordered authorized-signer names; the first is the default
    #[serde(default)]
    pub signer_candidates: Vec<String>,
    /// Upper bound for the portal's asynchronous validation
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,
    /// Upload attempts per job run
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl PortalConfig {
    pub fn new(jurisdiction: impl Into<String>, portal_url: impl Into<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            portal_url: portal_url.into(),
            credentials: PortalCredentials::default(),
            automation_enabled: true,
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            signer_candidates: Vec::new(),
            validation_timeout_secs: default_validation_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }

    pub fn default_signer(&self) -> Option<&str> {
        self.signer_candidates.first().map(String::as_str)
    }

    /// Absolute URL for a portal path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.portal_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// All configured portals keyed by uppercase jurisdiction code
#[derive(Debug, Clone, Default)]
pub struct PortalConfigs {
    by_code: HashMap<String, PortalConfig>,
}

impl PortalConfigs {
    pub fn new(configs: impl IntoIterator<Item = PortalConfig>) -> Self {
        let by_code = configs
            .into_iter()
            .map(|c| (c.jurisdiction.trim().to_ascii_uppercase(), c))
            .collect();
        Self { by_code }
    }

    pub fn get(&self, jurisdiction: &str) -> Option<&PortalConfig> {
        self.by_code.get(&jurisdiction.trim().to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
