//! WOTC submitter daemon: settings, logging and dependency wiring
//!
//! Shared with the operator CLI so both open the same store with the same settings.

pub mod logging;
pub mod services;
pub mod settings;

pub use services::Services;
pub use settings::Settings;
