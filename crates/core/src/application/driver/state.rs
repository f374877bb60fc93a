// Portal driver state machine
//
// LoggedOut -> LoggingIn -> Dashboard -> UploadStaged -> Validating
//   -> Clean -> Confirming -> Done
//   -> HasErrors -> Recovering -> Deleted -> UploadStaged (next attempt)
// Any non-terminal state may fall back to LoggedOut or give up with Aborted.

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    LoggedOut,
    LoggingIn,
    Dashboard,
    UploadStaged,
    Validating,
    Clean,
    Confirming,
    Done,
    HasErrors,
    Recovering,
    Deleted,
    Aborted,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::LoggedOut => "logged_out",
            DriverState::LoggingIn => "logging_in",
            DriverState::Dashboard => "dashboard",
            DriverState::UploadStaged => "upload_staged",
            DriverState::Validating => "validating",
            DriverState::Clean => "clean",
            DriverState::Confirming => "confirming",
            DriverState::Done => "done",
            DriverState::HasErrors => "has_errors",
            DriverState::Recovering => "recovering",
            DriverState::Deleted => "deleted",
            DriverState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DriverState::Done | DriverState::Aborted)
    }

    pub fn can_transition_to(&self, next: DriverState) -> bool {
        use DriverState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (*self, next),
            (_, LoggedOut)
                | (_, Aborted)
                | (LoggedOut, LoggingIn)
                | (LoggingIn, Dashboard)
                | (Dashboard, UploadStaged)
                | (Deleted, UploadStaged)
                | (UploadStaged, Validating)
                | (Validating, Clean)
                | (Validating, HasErrors)
                | (Clean, Confirming)
                | (Confirming, Done)
                | (HasErrors, Recovering)
                | (Recovering, Deleted)
        )
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every state visited, in order
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: DriverState,
    history: Vec<DriverState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: DriverState::LoggedOut,
            history: vec![DriverState::LoggedOut],
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn history(&self) -> &[DriverState] {
        &self.history
    }

    pub fn transition(&mut self, next: DriverState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidDriverTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
