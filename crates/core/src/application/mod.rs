// Application Layer - Use Cases and Business Logic

pub mod driver;
pub mod enqueue;
pub mod notify;
pub mod orchestrator;
pub mod reconcile;
pub mod recovery;
pub mod retry;

// Re-exports
pub use driver::{BrowserPortalFactory, Pacer, PortalDriver, PortalSubmissionDriver};
pub use enqueue::{EnqueueRequest, EnqueueService};
pub use notify::NotificationHub;
pub use orchestrator::{
    shutdown_channel, Orchestrator, OrchestratorConfig, OrchestratorHandle, ShutdownSender,
    ShutdownToken,
};
pub use recovery::{RecoveryService, SweepReport};
pub use retry::{RetryDecision, RetryPolicy};
