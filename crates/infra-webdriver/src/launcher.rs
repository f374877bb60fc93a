// BrowserLauncher: one fresh WebDriver session per job

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;
use wotc_core::port::{BrowserError, BrowserLauncher, BrowserSession};

use crate::client::WebDriverClient;
use crate::session::WebDriverSession;

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    /// Upload files are staged under `<staging_dir>/<session id>/`
    pub staging_dir: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub window_size: (u32, u32),
}

impl Default for LaunchSettings {
    fn default() -> Self {
        let base = std::env::temp_dir().join("wotc-submitter");
        Self {
            headless: true,
            staging_dir: base.join("staging"),
            diagnostics_dir: base.join("diagnostics"),
            window_size: (1366, 900),
        }
    }
}

impl LaunchSettings {
    /// Chrome capabilities
    pub fn capabilities(&self) -> Value {
        let (w, h) = self.window_size;
        let mut args = vec![
            format!("--window-size={w},{h}"),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        json!({
            "alwaysMatch": {
                "browserName": "chrome",
                "acceptInsecureCerts": false,
                "unhandledPromptBehavior": "ignore",
                "goog:chromeOptions": { "args": args }
            }
        })
    }
}

pub struct WebDriverLauncher {
    client: WebDriverClient,
    settings: LaunchSettings,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: &str, settings: LaunchSettings) -> Result<Self, BrowserError> {
        Ok(Self {
            client: WebDriverClient::new(webdriver_url)?,
            settings,
        })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let session_id = self.client.new_session(self.settings.capabilities()).await?;
        info!(
            session_id = %session_id,
            webdriver = %self.client.base_url(),
            headless = self.settings.headless,
            "Browser session started"
        );
        Ok(Box::new(WebDriverSession::new(
            self.client.clone(),
            session_id.clone(),
            self.settings.staging_dir.join(&session_id),
            self.settings.diagnostics_dir.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{serve, Reply};

    fn element(id: &str) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("element-6066-11e4-a52e-4f735466cecf".to_string(), json!(id));
        Value::Object(map)
    }

    fn fake_driver(method: &str, path: &str, body: &str) -> Reply {
        match (method, path) {
            ("POST", "/session") => Reply::ok(json!({ "sessionId": "s1", "capabilities": {} })),
            ("POST", "/session/s1/url") => Reply::ok(Value::Null),
            ("GET", "/session/s1/url") => Reply::ok(json!("https://portal.test/dashboard")),
            ("POST", "/session/s1/elements") if body.contains("#present") => {
                Reply::ok(json!([element("e1")]))
            }
            ("POST", "/session/s1/elements") => Reply::ok(json!([])),
            ("POST", "/session/s1/element") if body.contains("#missing") => {
                Reply::error(404, "no such element")
            }
            ("POST", "/session/s1/element") => Reply::ok(element("e1")),
            ("POST", "/session/s1/element/e1/click")
            | ("POST", "/session/s1/element/e1/clear")
            | ("POST", "/session/s1/element/e1/value") => Reply::ok(Value::Null),
            ("GET", "/session/s1/element/e1/text") => Reply::ok(json!("  Batch 4411 accepted ")),
            ("POST", "/session/s1/execute/sync") => Reply::ok(json!([
                { "class": "applicant", "cells": ["Applicant: Maria Lopez"] },
                { "class": "", "cells": ["2", "rec-001", "SSN", "Error", "Invalid SSN"] }
            ])),
            ("POST", "/session/s1/alert/accept") => Reply::error(404, "no such alert"),
            ("GET", "/session/s1/screenshot") => Reply::ok(json!("iVBORw0KGgo=")),
            ("DELETE", "/session/s1") => Reply::ok(Value::Null),
            _ => Reply::error(404, "unknown command"),
        }
    }

    fn settings(tag: &str) -> LaunchSettings {
        let base = std::env::temp_dir().join(format!("wotc-wd-{}-{tag}", std::process::id()));
        LaunchSettings {
            headless: true,
            staging_dir: base.join("staging"),
            diagnostics_dir: base.join("diagnostics"),
            window_size: (800, 600),
        }
    }

    #[test]
    fn test_headless_capabilities() {
        let caps = settings("caps").capabilities();
        let args = caps["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--window-size=800,600")));

        let mut headed = settings("caps");
        headed.headless = false;
        let caps = headed.capabilities();
        assert!(!caps.to_string().contains("--headless"));
    }

    #[tokio::test]
    async fn test_session_round_trip_against_fake_driver() {
        let (base, requests) = serve(fake_driver).await;
        let settings = settings("session");
        let launcher = WebDriverLauncher::new(&base, settings.clone()).unwrap();
        let session = launcher.launch().await.unwrap();

        session.goto("https://portal.test/login").await.unwrap();
        assert_eq!(
            session.current_url().await.unwrap(),
            "https://portal.test/dashboard"
        );
        assert!(session.is_present("#present").await.unwrap());
        assert!(!session.is_present("#absent").await.unwrap());
        session.click("#submit").await.unwrap();
        session.send_keys("#user", "ops").await.unwrap();
        assert_eq!(
            session.click("#missing").await.unwrap_err(),
            BrowserError::NoSuchElement("#missing".into())
        );
        assert_eq!(session.text("#banner").await.unwrap(), "Batch 4411 accepted");

        let rows = session.table_rows("table.errors tr").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].class, "applicant");
        assert_eq!(rows[1].cells[1], "rec-001");

        assert!(!session.accept_dialog().await.unwrap());

        session
            .attach_file("#file", "AZ batch.csv", b"a,b\r\n")
            .await
            .unwrap();
        let staged = settings.staging_dir.join("s1").join("AZ_batch.csv");
        assert_eq!(std::fs::read(&staged).unwrap(), b"a,b\r\n");

        let capture = session.screenshot("login failed").await.unwrap();
        assert!(capture.0.ends_with("s1-login_failed.png.b64"));
        assert_eq!(std::fs::read_to_string(&capture.0).unwrap(), "iVBORw0KGgo=");

        session.close().await.unwrap();
        assert!(!staged.exists());

        let log = requests.lock().unwrap().clone();
        assert!(log.iter().any(|r| r.starts_with("POST /session/s1/element/e1/value")
            && r.contains("AZ_batch.csv")));
        assert!(log.iter().any(|r| r.starts_with("DELETE /session/s1")));

        let _ = std::fs::remove_dir_all(settings.diagnostics_dir.parent().unwrap());
    }

    #[tokio::test]
    async fn test_launch_failure_is_launch_error() {
        let (base, _requests) = serve(|_, _, _| Reply::error(500, "session not created")).await;
        let launcher = WebDriverLauncher::new(&base, settings("fail")).unwrap();
        let err = launcher.launch().await.err().unwrap();
        assert!(matches!(err, BrowserError::Launch(_)));
    }
}
