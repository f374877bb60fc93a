// Browser-backed portal operations
//
// Translates each workflow step into page interactions using the jurisdiction's page
// layout. Waits are bounded polls; nothing here classifies errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::driver::pacing::Pacer;
use crate::domain::{JurisdictionDescriptor, PortalConfig};
use crate::encoding::Artifact;
use crate::port::{
    BrowserLauncher, BrowserSession, CaptureRef, LoginReport, PortalError, PortalOperations,
    PortalSessionFactory, TableRow, ValidationOutcome,
};

const STEP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Guard against a next-page link that never disappears
const MAX_RESULT_PAGES: usize = 50;
/// Login, upload, delete and confirm waits around each validation wait
const STEP_MARGIN: Duration = Duration::from_secs(4 * STEP_TIMEOUT.as_secs());

/// Longest a driver run can take before its attempt budget runs out
pub fn max_run_duration(config: &PortalConfig) -> Duration {
    let per_attempt = Duration::from_secs(config.validation_timeout_secs) + STEP_MARGIN;
    per_attempt * config.max_attempts.max(1)
}

pub struct BrowserPortal {
    session: Box<dyn BrowserSession>,
    descriptor: &'static JurisdictionDescriptor,
    config: PortalConfig,
    pacer: Pacer,
    dashboard: Regex,
}

impl BrowserPortal {
    pub fn new(
        session: Box<dyn BrowserSession>,
        descriptor: &'static JurisdictionDescriptor,
        config: PortalConfig,
        pacer: Pacer,
    ) -> Result<Self, PortalError> {
        let dashboard = Regex::new(descriptor.portal.dashboard_url_pattern).map_err(|e| {
            PortalError::Navigation(format!("bad dashboard pattern for {}: {e}", descriptor.code))
        })?;
        Ok(Self {
            session,
            descriptor,
            config,
            pacer,
            dashboard,
        })
    }

    /// Poll until one of `selectors` is present; returns its index
    async fn wait_for_any(&self, selectors: &[&str], timeout: Duration) -> Result<usize, PortalError> {
        let deadline = Instant::now() + timeout;
        loop {
            for (i, selector) in selectors.iter().enumerate() {
                if self.session.is_present(selector).await? {
                    return Ok(i);
                }
            }
            if Instant::now() >= deadline {
                return Err(PortalError::Timeout(selectors.join(" | ")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for(&self, selector: &str) -> Result<(), PortalError> {
        self.wait_for_any(&[selector], STEP_TIMEOUT).await.map(|_| ())
    }

    async fn wait_for_dashboard(&self) -> Result<String, PortalError> {
        let deadline = Instant::now() + STEP_TIMEOUT;
        loop {
            let url = self.session.current_url().await?;
            if self.dashboard.is_match(&url) {
                return Ok(url);
            }
            if Instant::now() >= deadline {
                return Err(PortalError::UnexpectedPage(url));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn sign_in(&self) -> Result<String, PortalError> {
        let page = &self.descriptor.portal;
        self.session.goto(&self.config.url(page.login_path)).await?;
        self.wait_for(page.username_input).await?;

        let credentials = &self.config.credentials;
        self.pacer
            .type_into(self.session.as_ref(), page.username_input, &credentials.username)
            .await?;
        self.pacer.pause().await;
        self.pacer
            .type_into(self.session.as_ref(), page.password_input, &credentials.password)
            .await?;
        if let Some(agreement) = page.agreement_checkbox {
            self.pacer.pause().await;
            self.session.click(agreement).await?;
        }
        self.pacer.pause().await;
        self.session.click(page.login_button).await?;
        self.wait_for_dashboard().await
    }

    /// A bounce back to the login page means the session expired
    async fn ensure_signed_in(&self) -> Result<(), PortalError> {
        let url = self.session.current_url().await?;
        let login_path = self.descriptor.portal.login_path;
        if url.contains(login_path) && !self.dashboard.is_match(&url) {
            return Err(PortalError::SessionLost(url));
        }
        Ok(())
    }

    async fn collect_pages(&self) -> Result<Vec<TableRow>, PortalError> {
        let page = &self.descriptor.portal;
        let mut rows = self.session.table_rows(page.results_rows).await?;
        for n in 1..MAX_RESULT_PAGES {
            if !self.session.is_present(page.next_page).await? {
                return Ok(rows);
            }
            self.session.click(page.next_page).await?;
            self.pacer.pause().await;
            self.wait_for(page.results_table).await?;
            let more = self.session.table_rows(page.results_rows).await?;
            debug!(page = n + 1, rows = more.len(), "Read error table page");
            rows.extend(more);
        }
        warn!(
            jurisdiction = self.descriptor.code,
            max_pages = MAX_RESULT_PAGES,
            "Error table pagination cut short"
        );
        Ok(rows)
    }
}

/// Confirmation numbers are the digit-bearing tokens of the confirmation text
fn parse_confirmations(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl PortalOperations for BrowserPortal {
    async fn login(&mut self) -> LoginReport {
        match self.sign_in().await {
            Ok(url) => LoginReport {
                authenticated: true,
                landed_url: Some(url),
                diagnostic: None,
                capture: None,
            },
            Err(e) => {
                let landed_url = self.session.current_url().await.ok();
                let capture = self.capture("login-failed").await;
                LoginReport {
                    authenticated: false,
                    landed_url,
                    diagnostic: Some(e.to_string()),
                    capture,
                }
            }
        }
    }

    async fn stage_upload(&mut self, artifact: &Artifact) -> Result<(), PortalError> {
        let page = &self.descriptor.portal;
        self.session.goto(&self.config.url(page.import_path)).await?;
        self.ensure_signed_in().await?;
        self.wait_for(page.file_input).await?;
        self.session
            .attach_file(page.file_input, &artifact.file_name, artifact.bytes())
            .await?;
        self.pacer.pause().await;
        self.session.click(page.import_button).await?;
        Ok(())
    }

    async fn await_validation(&mut self) -> Result<ValidationOutcome, PortalError> {
        let page = &self.descriptor.portal;
        let timeout = Duration::from_secs(self.config.validation_timeout_secs);
        let settled = self
            .wait_for_any(&[page.clean_marker, page.results_table], timeout)
            .await?;
        if settled == 0 {
            return Ok(ValidationOutcome::Clean);
        }
        let rows = self.collect_pages().await?;
        if rows.is_empty() {
            return Ok(ValidationOutcome::Clean);
        }
        Ok(ValidationOutcome::Errors(rows))
    }

    async fn delete_batch(&mut self) -> Result<(), PortalError> {
        let page = &self.descriptor.portal;
        self.session.click(page.delete_button).await?;
        self.pacer.pause().await;
        if self.session.is_present(page.delete_confirm_button).await? {
            self.session.click(page.delete_confirm_button).await?;
        } else if !self.session.accept_dialog().await? {
            return Err(PortalError::UnexpectedPage("no delete confirmation prompt".into()));
        }
        self.pacer.pause().await;
        Ok(())
    }

    async fn confirm_batch(&mut self) -> Result<Vec<String>, PortalError> {
        let page = &self.descriptor.portal;
        self.session.click(page.confirm_button).await?;
        self.wait_for(page.confirmation_number).await?;
        let text = self.session.text(page.confirmation_number).await?;
        let confirmations = parse_confirmations(&text);
        if confirmations.is_empty() {
            return Err(PortalError::UnexpectedPage(format!(
                "no confirmation number in '{text}'"
            )));
        }
        Ok(confirmations)
    }

    async fn capture(&mut self, label: &str) -> Option<CaptureRef> {
        match self.session.screenshot(label).await {
            Ok(capture) => Some(capture),
            Err(e) => {
                debug!(label, error = %e, "Screenshot failed");
                None
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            debug!(error = %e, "Browser close failed");
        }
    }
}

/// Launches one fresh browser per job
pub struct BrowserPortalFactory {
    launcher: Arc<dyn BrowserLauncher>,
    pacer: Pacer,
}

impl BrowserPortalFactory {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, pacer: Pacer) -> Self {
        Self { launcher, pacer }
    }
}

#[async_trait]
impl PortalSessionFactory for BrowserPortalFactory {
    async fn open(
        &self,
        descriptor: &'static JurisdictionDescriptor,
        config: &PortalConfig,
    ) -> Result<Box<dyn PortalOperations>, PortalError> {
        let session = self.launcher.launch().await?;
        let portal = BrowserPortal::new(session, descriptor, config.clone(), self.pacer.clone())?;
        Ok(Box::new(portal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jurisdiction;
    use crate::encoding::{self, fixtures};
    use crate::port::browser::mocks::{FakeBrowser, FakeLauncher};

    const BASE: &str = "https://az.portal.test";

    #[test]
    fn test_max_run_duration() {
        let mut config = PortalConfig::new("AZ", BASE);
        assert_eq!(max_run_duration(&config), Duration::from_secs(3 * 420));
        config.validation_timeout_secs = 900;
        config.max_attempts = 0;
        assert_eq!(max_run_duration(&config), Duration::from_secs(1020));
    }

    fn az() -> &'static JurisdictionDescriptor {
        jurisdiction::lookup("AZ").unwrap()
    }

    fn portal(browser: &FakeBrowser) -> BrowserPortal {
        let mut config = PortalConfig::new("AZ", BASE);
        config.credentials.username = "grill-admin".into();
        config.credentials.password = "hunter2".into();
        config.validation_timeout_secs = 60;
        BrowserPortal::new(Box::new(browser.clone()), az(), config, Pacer::disabled()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_reaches_dashboard() {
        let page = &az().portal;
        let browser = FakeBrowser::new()
            .with_present(page.username_input)
            .on_click_navigate(page.login_button, &format!("{BASE}/employer/dashboard"));
        let report = portal(&browser).login().await;

        assert!(report.authenticated, "{:?}", report.diagnostic);
        let actions = browser.actions();
        assert_eq!(actions[0], format!("goto {BASE}/login"));
        assert!(actions.contains(&format!("keys {} grill-admin", page.username_input)));
        assert!(actions.contains(&format!("click {}", page.agreement_checkbox.unwrap())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_failure_reports_landing_page() {
        let page = &az().portal;
        let browser = FakeBrowser::new()
            .with_present(page.username_input)
            .on_click_navigate(page.login_button, &format!("{BASE}/login?error=1"));
        let report = portal(&browser).login().await;

        assert!(!report.authenticated);
        assert_eq!(report.landed_url, Some(format!("{BASE}/login?error=1")));
        assert!(report.capture.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_reads_every_page() {
        let page = &az().portal;
        let browser = FakeBrowser::new()
            .with_present(page.results_table)
            .with_pages(
                page.next_page,
                vec![
                    vec![TableRow::new("", &["2", "rec-001", "SSN", "Error", "Invalid SSN"])],
                    vec![TableRow::new("", &["3", "rec-002", "ZIP", "Error", "Invalid ZIP"])],
                ],
            );
        let outcome = portal(&browser).await_validation().await.unwrap();
        match outcome {
            ValidationOutcome::Errors(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected errors, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_times_out() {
        let browser = FakeBrowser::new();
        let err = portal(&browser).await_validation().await.unwrap_err();
        assert!(matches!(err, PortalError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_and_confirm() {
        let page = &az().portal;
        let browser = FakeBrowser::new()
            .with_present(page.file_input)
            .with_present(page.confirmation_number)
            .with_text(page.confirmation_number, "Confirmation #: AZ-20250113-0042");
        let mut portal = portal(&browser);
        let artifact = encoding::encode_with(az(), &fixtures::records(2)).unwrap();

        portal.stage_upload(&artifact).await.unwrap();
        let confirmations = portal.confirm_batch().await.unwrap();
        assert_eq!(confirmations, vec!["AZ-20250113-0042".to_string()]);
        assert!(browser
            .actions()
            .iter()
            .any(|a| a.starts_with(&format!("attach {} {}", page.file_input, artifact.file_name))));
    }

    #[tokio::test]
    async fn test_delete_uses_confirm_button_when_present() {
        let page = &az().portal;
        let browser = FakeBrowser::new().with_present(page.delete_confirm_button);
        portal(&browser).delete_batch().await.unwrap();
        assert_eq!(
            browser.actions(),
            vec![
                format!("click {}", page.delete_button),
                format!("click {}", page.delete_confirm_button)
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_without_prompt_is_unexpected() {
        let browser = FakeBrowser::new();
        let err = portal(&browser).delete_batch().await.unwrap_err();
        assert!(matches!(err, PortalError::UnexpectedPage(_)));
    }

    #[tokio::test]
    async fn test_factory_opens_fresh_portal() {
        let factory = BrowserPortalFactory::new(
            Arc::new(FakeLauncher {
                browser: FakeBrowser::new(),
            }),
            Pacer::disabled(),
        );
        let config = PortalConfig::new("AZ", BASE);
        assert!(factory.open(az(), &config).await.is_ok());
    }

    #[test]
    fn test_parse_confirmations() {
        assert_eq!(parse_confirmations("Batch accepted. Confirmation: 88231"), vec!["88231"]);
        assert_eq!(parse_confirmations("A-1, B-2"), vec!["A-1", "B-2"]);
        assert!(parse_confirmations("Thank you").is_empty());
    }
}
