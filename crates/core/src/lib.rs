// WOTC Core - Domain Logic, Encoders, Portal Driver & Ports
// NO infrastructure dependencies: database, HTTP and browser protocol live in adapter crates

pub mod application;
pub mod domain;
pub mod encoding;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
