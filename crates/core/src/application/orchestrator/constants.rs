// Orchestrator defaults (no magic values)
use std::time::Duration;

/// How often the store is polled for dispatchable jobs
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Jobs (and therefore browser sessions) running at once
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Staleness sweep cadence, in polls (5 minutes at the default interval)
pub const DEFAULT_SWEEP_EVERY_POLLS: u64 = 5;
