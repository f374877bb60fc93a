//! Layered configuration: TOML file, then `WOTC__*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use wotc_core::application::driver::max_run_duration;
use wotc_core::application::OrchestratorConfig;
use wotc_core::domain::{jurisdiction, PortalConfig, PortalConfigs};
use wotc_infra_webdriver::LaunchSettings;
use wotc_notify::NotificationsConfig;

pub const DEFAULT_CONFIG_PATH: &str = "~/.wotc-submitter/submitter.toml";
const ENV_PREFIX: &str = "WOTC";

fn default_database_url() -> String {
    "sqlite://~/.wotc-submitter/submitter.db".to_string()
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_max_concurrent() -> usize {
    5
}
fn default_stale_after_secs() -> u64 {
    45 * 60
}
fn default_sweep_every_polls() -> u64 {
    5
}
fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}
fn default_true() -> bool {
    true
}
fn default_diagnostics_dir() -> String {
    "~/.wotc-submitter/diagnostics".to_string()
}
fn default_staging_dir() -> String {
    "~/.wotc-submitter/staging".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// 0 disables the periodic sweep (the startup sweep still runs)
    #[serde(default = "default_sweep_every_polls")]
    pub sweep_every_polls: u64,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_true")]
    pub human_pacing: bool,
    #[serde(default)]
    pub portals: Vec<PortalConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl Settings {
    /// Load from `path`, else `$WOTC_CONFIG`, else the default location
    ///
    /// Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("WOTC_CONFIG").map(PathBuf::from));
        let required = explicit.is_some();
        let path = match explicit {
            Some(p) => expand(&p.to_string_lossy()),
            None => expand(DEFAULT_CONFIG_PATH),
        };
        Self::load_from(&path, required, ENV_PREFIX)
    }

    pub(crate) fn load_from(path: &str, required: bool, env_prefix: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml).required(required))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {path}"))?;

        let mut settings: Settings = raw
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    fn normalize(&mut self) {
        self.database_url = expand_database_url(&self.database_url);
        self.diagnostics_dir = expand(&self.diagnostics_dir);
        self.staging_dir = expand(&self.staging_dir);
        self.log_dir = self.log_dir.as_deref().map(expand);

        // Secrets may stay out of the file: WOTC_PORTAL_<CODE>_PASSWORD
        for portal in &mut self.portals {
            if portal.credentials.password.is_empty() {
                let key = format!(
                    "WOTC_PORTAL_{}_PASSWORD",
                    portal.jurisdiction.trim().to_ascii_uppercase()
                );
                if let Ok(password) = std::env::var(&key) {
                    portal.credentials.password = password;
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        for portal in &self.portals {
            if jurisdiction::lookup(&portal.jurisdiction).is_none() {
                bail!("portal configured for unknown jurisdiction '{}'", portal.jurisdiction);
            }
            if portal.automation_enabled && portal.credentials.username.trim().is_empty() {
                bail!("portal {} has automation enabled but no username", portal.jurisdiction);
            }
            // A sweep must never reclaim a run another process is still driving
            let budget = max_run_duration(portal).as_secs();
            if self.stale_after_secs <= budget {
                bail!(
                    "stale_after_secs ({}) must exceed the {}s a {} portal run can take",
                    self.stale_after_secs,
                    budget,
                    portal.jurisdiction
                );
            }
        }
        Ok(())
    }

    pub fn portal_configs(&self) -> PortalConfigs {
        PortalConfigs::new(self.portals.iter().cloned())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_concurrent: self.max_concurrent,
            sweep_every_polls: self.sweep_every_polls,
        }
    }

    pub fn stale_after_ms(&self) -> i64 {
        (self.stale_after_secs as i64).saturating_mul(1_000)
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            headless: self.headless,
            staging_dir: PathBuf::from(&self.staging_dir),
            diagnostics_dir: PathBuf::from(&self.diagnostics_dir),
            ..LaunchSettings::default()
        }
    }
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// `sqlite://~/x.db` -> `sqlite:///home/me/x.db`
fn expand_database_url(url: &str) -> String {
    match url.strip_prefix("sqlite://") {
        Some(rest) if rest.starts_with('~') => format!("sqlite://{}", expand(rest)),
        _ => url.to_string(),
    }
}
