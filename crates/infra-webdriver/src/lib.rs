// WOTC Infrastructure - WebDriver Adapter
// Implements: BrowserLauncher, BrowserSession over the W3C WebDriver wire protocol

mod client;
mod launcher;
mod session;
#[cfg(test)]
mod test_server;

pub use client::WebDriverClient;
pub use launcher::{LaunchSettings, WebDriverLauncher};
pub use session::WebDriverSession;
