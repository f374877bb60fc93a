// Browser Port
//
// The minimum surface the portal driver needs from a headless browser. Waiting and
// pacing live in the driver, so implementations stay thin protocol adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("no element matches '{0}'")]
    NoSuchElement(String),

    #[error("browser timeout: {0}")]
    Timeout(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser session closed")]
    SessionClosed,
}

/// Opaque handle to a stored screenshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRef(pub String);

impl std::fmt::Display for CaptureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `<tr>`: its class attribute and trimmed cell texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub class: String,
    pub cells: Vec<String>,
}

impl TableRow {
    pub fn new(class: &str, cells: &[&str]) -> Self {
        Self {
            class: class.to_string(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// True when at least one element matches
    async fn is_present(&self, selector: &str) -> Result<bool, BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn clear(&self, selector: &str) -> Result<(), BrowserError>;

    /// Append `text` to the element's value
    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Put `contents` on disk under `file_name` and hand it to a file input
    async fn attach_file(
        &self,
        selector: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<(), BrowserError>;

    async fn text(&self, selector: &str) -> Result<String, BrowserError>;

    async fn table_rows(&self, row_selector: &str) -> Result<Vec<TableRow>, BrowserError>;

    /// Accept an open alert/confirm dialog; `false` when none was open
    async fn accept_dialog(&self) -> Result<bool, BrowserError>;

    async fn screenshot(&self, label: &str) -> Result<CaptureRef, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start a fresh, unshared session
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct FakeState {
        url: String,
        present: HashSet<String>,
        /// selector -> url the browser lands on after clicking it
        click_nav: HashMap<String, String>,
        /// selector -> selectors that appear after clicking it
        click_reveals: HashMap<String, Vec<String>>,
        texts: HashMap<String, String>,
        pages: Vec<Vec<TableRow>>,
        page: usize,
        next_page_selector: Option<String>,
        actions: Vec<String>,
        closed: bool,
    }

    /// Scriptable in-memory browser
    #[derive(Debug, Clone, Default)]
    pub struct FakeBrowser {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeBrowser {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_present(self, selector: &str) -> Self {
            self.state.lock().unwrap().present.insert(selector.to_string());
            self
        }

        pub fn on_click_navigate(self, selector: &str, url: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .click_nav
                .insert(selector.to_string(), url.to_string());
            self
        }

        pub fn on_click_reveal(self, selector: &str, revealed: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .click_reveals
                .entry(selector.to_string())
                .or_default()
                .push(revealed.to_string());
            self
        }

        pub fn with_text(self, selector: &str, text: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .texts
                .insert(selector.to_string(), text.to_string());
            self
        }

        /// Table pages; `next_selector` is present while a later page exists
        pub fn with_pages(self, next_selector: &str, pages: Vec<Vec<TableRow>>) -> Self {
            {
                let mut s = self.state.lock().unwrap();
                s.pages = pages;
                s.page = 0;
                s.next_page_selector = Some(next_selector.to_string());
            }
            self
        }

        pub fn actions(&self) -> Vec<String> {
            self.state.lock().unwrap().actions.clone()
        }

        pub fn is_closed(&self) -> bool {
            self.state.lock().unwrap().closed
        }

        fn log(&self, action: String) {
            self.state.lock().unwrap().actions.push(action);
        }
    }

    #[async_trait]
    impl BrowserSession for FakeBrowser {
        async fn goto(&self, url: &str) -> Result<(), BrowserError> {
            self.log(format!("goto {url}"));
            self.state.lock().unwrap().url = url.to_string();
            Ok(())
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            Ok(self.state.lock().unwrap().url.clone())
        }

        async fn is_present(&self, selector: &str) -> Result<bool, BrowserError> {
            let s = self.state.lock().unwrap();
            if s.next_page_selector.as_deref() == Some(selector) {
                return Ok(s.page + 1 < s.pages.len());
            }
            Ok(s.present.contains(selector))
        }

        async fn click(&self, selector: &str) -> Result<(), BrowserError> {
            self.log(format!("click {selector}"));
            let mut s = self.state.lock().unwrap();
            if s.next_page_selector.as_deref() == Some(selector) {
                if s.page + 1 >= s.pages.len() {
                    return Err(BrowserError::NoSuchElement(selector.to_string()));
                }
                s.page += 1;
                return Ok(());
            }
            if let Some(url) = s.click_nav.get(selector).cloned() {
                s.url = url;
            }
            if let Some(revealed) = s.click_reveals.get(selector).cloned() {
                s.present.extend(revealed);
            }
            Ok(())
        }

        async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
            self.log(format!("clear {selector}"));
            Ok(())
        }

        async fn send_keys(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
            self.log(format!("keys {selector} {text}"));
            Ok(())
        }

        async fn attach_file(
            &self,
            selector: &str,
            file_name: &str,
            contents: &[u8],
        ) -> Result<(), BrowserError> {
            self.log(format!("attach {selector} {file_name} {}", contents.len()));
            Ok(())
        }

        async fn text(&self, selector: &str) -> Result<String, BrowserError> {
            self.state
                .lock()
                .unwrap()
                .texts
                .get(selector)
                .cloned()
                .ok_or_else(|| BrowserError::NoSuchElement(selector.to_string()))
        }

        async fn table_rows(&self, _row_selector: &str) -> Result<Vec<TableRow>, BrowserError> {
            let s = self.state.lock().unwrap();
            Ok(s.pages.get(s.page).cloned().unwrap_or_default())
        }

        async fn accept_dialog(&self) -> Result<bool, BrowserError> {
            self.log("accept dialog".to_string());
            Ok(false)
        }

        async fn screenshot(&self, label: &str) -> Result<CaptureRef, BrowserError> {
            Ok(CaptureRef(format!("fake://{label}")))
        }

        async fn close(&self) -> Result<(), BrowserError> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }

    /// Hands out clones of one fake browser
    pub struct FakeLauncher {
        pub browser: FakeBrowser,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            Ok(Box::new(self.browser.clone()))
        }
    }
}
