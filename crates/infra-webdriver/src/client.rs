// W3C WebDriver HTTP client
//
// Every response is `{"value": ...}`; failures carry `value.error` / `value.message`.

use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::trace;
use wotc_core::port::BrowserError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote error codes the session layer cares about
pub(crate) const NO_SUCH_ELEMENT: &str = "no such element";
pub(crate) const NO_SUCH_ALERT: &str = "no such alert";
pub(crate) const INVALID_SESSION: &str = "invalid session id";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WireError {
    Transport(String),
    Remote { code: String, message: String },
}

impl WireError {
    pub(crate) fn is(&self, code: &str) -> bool {
        matches!(self, WireError::Remote { code: c, .. } if c == code)
    }

    pub(crate) fn into_browser(self, context: &str) -> BrowserError {
        match self {
            WireError::Transport(msg) => BrowserError::Transport(msg),
            WireError::Remote { code, message } => match code.as_str() {
                NO_SUCH_ELEMENT => BrowserError::NoSuchElement(context.to_string()),
                INVALID_SESSION => BrowserError::SessionClosed,
                "timeout" | "script timeout" | "page load timeout" => {
                    BrowserError::Timeout(format!("{context}: {message}"))
                }
                _ => BrowserError::Protocol(format!("{context}: {code}: {message}")),
            },
        }
    }
}

/// Split a wire response into its value or remote error
pub(crate) fn unwrap_value(status: u16, body: &str) -> Result<Value, WireError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        WireError::Transport(format!("unparseable response (HTTP {status}): {e}"))
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(WireError::Remote {
            code: code.to_string(),
            message,
        });
    }
    if !(200..300).contains(&status) {
        return Err(WireError::Remote {
            code: format!("http {status}"),
            message: body.chars().take(200).collect(),
        });
    }
    Ok(value)
}

/// Thin client for one WebDriver server (chromedriver, geckodriver, Selenium)
#[derive(Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BrowserError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BrowserError::Launch(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WireError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%method, %url, "WebDriver command");

        let mut req = self.http.request(method.clone(), &url);
        if method != Method::GET && method != Method::DELETE {
            req = req.json(&body.unwrap_or_else(|| json!({})));
        }
        let resp = req
            .send()
            .await
            .map_err(|e| WireError::Transport(format!("{method} {path}: {e}")))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| WireError::Transport(format!("{method} {path}: {e}")))?;
        unwrap_value(status, &text)
    }

    /// `POST /session`; returns the new session id
    pub(crate) async fn new_session(&self, capabilities: Value) -> Result<String, BrowserError> {
        let value = self
            .send(Method::POST, "/session", Some(json!({ "capabilities": capabilities })))
            .await
            .map_err(|e| match e.into_browser("new session") {
                BrowserError::Transport(msg) | BrowserError::Protocol(msg) => {
                    BrowserError::Launch(msg)
                }
                other => other,
            })?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Launch("response carried no sessionId".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_value_success() {
        let v = unwrap_value(200, r#"{"value":"https://portal/home"}"#).unwrap();
        assert_eq!(v, json!("https://portal/home"));
        assert_eq!(unwrap_value(200, r#"{"value":null}"#).unwrap(), Value::Null);
    }

    #[test]
    fn test_remote_errors_map_to_browser_errors() {
        let err = unwrap_value(
            404,
            r#"{"value":{"error":"no such element","message":"nope","stacktrace":""}}"#,
        )
        .unwrap_err();
        assert!(err.is(NO_SUCH_ELEMENT));
        assert_eq!(
            err.into_browser("#login"),
            BrowserError::NoSuchElement("#login".into())
        );

        let err = unwrap_value(404, r#"{"value":{"error":"invalid session id","message":""}}"#)
            .unwrap_err();
        assert_eq!(err.into_browser("goto"), BrowserError::SessionClosed);

        let err = unwrap_value(500, r#"{"value":{"error":"timeout","message":"slow"}}"#)
            .unwrap_err();
        assert!(matches!(err.into_browser("goto"), BrowserError::Timeout(_)));
    }

    #[test]
    fn test_garbage_and_bare_http_errors() {
        assert!(matches!(
            unwrap_value(502, "<html>bad gateway</html>"),
            Err(WireError::Transport(_))
        ));
        let err = unwrap_value(500, r#"{"value":{}}"#).unwrap_err();
        assert!(matches!(err, WireError::Remote { ref code, .. } if code == "http 500"));
    }
}
