// Panic isolation for job tasks
//
// Each job runs in its own tokio task; a panic surfaces as a `JoinError` on the
// handle instead of taking the daemon down.
use std::any::Any;

use tokio::task::JoinError;

fn describe(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Human-readable reason for a job task that did not return normally
pub fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "job task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("job panicked: {}", describe(payload)),
        Err(_) => "job task failed".to_string(),
    }
}
