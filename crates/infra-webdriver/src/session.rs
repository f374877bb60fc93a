// BrowserSession over one WebDriver session

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use wotc_core::port::{BrowserError, BrowserSession, CaptureRef, TableRow};

use crate::client::{WebDriverClient, INVALID_SESSION, NO_SUCH_ALERT};

/// W3C web element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Row class plus trimmed cell texts for every element matching `arguments[0]`
const TABLE_ROWS_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll(arguments[0])).map(function (row) {
    return {
        class: row.className || "",
        cells: Array.from(row.querySelectorAll("th, td")).map(function (cell) {
            return (cell.innerText || cell.textContent || "").trim();
        })
    };
});
"#;

#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    class: String,
    #[serde(default)]
    cells: Vec<String>,
}

pub struct WebDriverSession {
    client: WebDriverClient,
    session_id: String,
    staging_dir: PathBuf,
    diagnostics_dir: PathBuf,
}

impl WebDriverSession {
    pub(crate) fn new(
        client: WebDriverClient,
        session_id: String,
        staging_dir: PathBuf,
        diagnostics_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            session_id,
            staging_dir,
            diagnostics_dir,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.session_id, suffix)
    }

    async fn call(
        &self,
        method: Method,
        suffix: &str,
        body: Option<Value>,
        context: &str,
    ) -> Result<Value, BrowserError> {
        self.client
            .send(method, &self.path(suffix), body)
            .await
            .map_err(|e| e.into_browser(context))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let value = self
            .call(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
                selector,
            )
            .await?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_id).collect())
            .unwrap_or_default())
    }

    async fn find(&self, selector: &str) -> Result<String, BrowserError> {
        let value = self
            .call(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
                selector,
            )
            .await?;
        element_id(&value).ok_or_else(|| BrowserError::NoSuchElement(selector.to_string()))
    }

    async fn element_command(
        &self,
        selector: &str,
        command: &str,
        body: Value,
    ) -> Result<Value, BrowserError> {
        let element = self.find(selector).await?;
        self.call(
            Method::POST,
            &format!("/element/{element}/{command}"),
            Some(body),
            selector,
        )
        .await
    }

    /// Write to `dir/name`, creating `dir` on demand
    async fn write_file(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf, BrowserError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BrowserError::Protocol(format!("create {}: {e}", dir.display())))?;
        let path = dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| BrowserError::Protocol(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }
}

fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}

/// Keep file names to `[A-Za-z0-9._-]`
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.client
            .send(Method::POST, &self.path("/url"), Some(json!({ "url": url })))
            .await
            .map_err(|e| match e.into_browser(url) {
                BrowserError::Protocol(msg) => BrowserError::Navigation(msg),
                other => other,
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.call(Method::GET, "/url", None, "current url").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_present(&self, selector: &str) -> Result<bool, BrowserError> {
        Ok(!self.find_all(selector).await?.is_empty())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.element_command(selector, "click", json!({})).await?;
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        self.element_command(selector, "clear", json!({})).await?;
        Ok(())
    }

    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.element_command(selector, "value", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn attach_file(
        &self,
        selector: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<(), BrowserError> {
        let path = Self::write_file(&self.staging_dir, &sanitize(file_name), contents).await?;
        let absolute = std::path::absolute(&path).unwrap_or(path);
        debug!(file = %absolute.display(), bytes = contents.len(), "Staged upload");
        self.send_keys(selector, &absolute.to_string_lossy()).await
    }

    async fn text(&self, selector: &str) -> Result<String, BrowserError> {
        let element = self.find(selector).await?;
        let value = self
            .call(Method::GET, &format!("/element/{element}/text"), None, selector)
            .await?;
        Ok(value.as_str().unwrap_or_default().trim().to_string())
    }

    async fn table_rows(&self, row_selector: &str) -> Result<Vec<TableRow>, BrowserError> {
        let value = self
            .call(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": TABLE_ROWS_SCRIPT, "args": [row_selector] })),
                row_selector,
            )
            .await?;
        let rows: Vec<RawRow> = serde_json::from_value(value)
            .map_err(|e| BrowserError::Protocol(format!("table rows: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|r| TableRow {
                class: r.class,
                cells: r.cells,
            })
            .collect())
    }

    async fn accept_dialog(&self) -> Result<bool, BrowserError> {
        match self
            .client
            .send(Method::POST, &self.path("/alert/accept"), Some(json!({})))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is(NO_SUCH_ALERT) => Ok(false),
            Err(e) => Err(e.into_browser("accept dialog")),
        }
    }

    /// Stored as the base64 PNG text WebDriver returns
    async fn screenshot(&self, label: &str) -> Result<CaptureRef, BrowserError> {
        let value = self.call(Method::GET, "/screenshot", None, "screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("screenshot was not a string".into()))?;
        let name = format!(
            "{}-{}-{}.png.b64",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            sanitize(&self.session_id),
            sanitize(label)
        );
        let path = Self::write_file(&self.diagnostics_dir, &name, encoded.as_bytes()).await?;
        Ok(CaptureRef(path.to_string_lossy().into_owned()))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let result = self.client.send(Method::DELETE, &self.path(""), None).await;
        if let Err(e) = tokio::fs::remove_dir_all(&self.staging_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.staging_dir.display(), error = %e, "Staging cleanup failed");
            }
        }
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is(INVALID_SESSION) => Ok(()),
            Err(e) => Err(e.into_browser("close")),
        }
    }
}
