use std::time::Duration;

use acp_api::{ApiError, FailureClass};

use crate::state::TransitionError;
use crate::types::CompositeKey;

/// Remote step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchUser,
    ListApps,
    CreateApp,
    ListRepos,
    CreateRepo,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::FetchUser => "fetch_user",
            Step::ListApps => "list_apps",
            Step::CreateApp => "create_app",
            Step::ListRepos => "list_repos",
            Step::CreateRepo => "create_repo",
        };
        f.write_str(s)
    }
}

/// Coarse classification surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Service,
    Precondition,
    Deadline,
}

/// Fatal run error. The first one observed aborts the run; creations already
/// issued stay in place and the next run resumes from the remote state.
#[derive(Debug)]
pub enum ReconcileError {
    Api {
        step: Step,
        key: Option<CompositeKey>,
        source: ApiError,
    },
    /// An expected resource was absent or the variant lifecycle was violated.
    Precondition(String),
    DeadlineExceeded(Duration),
    /// A worker task panicked or was cancelled.
    TaskFailed(String),
}

impl ReconcileError {
    pub(crate) fn api(step: Step, key: Option<&CompositeKey>, source: ApiError) -> Self {
        ReconcileError::Api {
            step,
            key: key.cloned(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Api { source, .. } => match source.class() {
                FailureClass::Transport => ErrorKind::Transport,
                FailureClass::Service => ErrorKind::Service,
            },
            ReconcileError::Precondition(_) | ReconcileError::TaskFailed(_) => {
                ErrorKind::Precondition
            }
            ReconcileError::DeadlineExceeded(_) => ErrorKind::Deadline,
        }
    }

    /// Variant the failure belongs to, if any.
    pub fn key(&self) -> Option<&CompositeKey> {
        match self {
            ReconcileError::Api { key, .. } => key.as_ref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Api {
                step,
                key: Some(key),
                source,
            } => write!(f, "{step} failed for {key}: {source}"),
            ReconcileError::Api {
                step,
                key: None,
                source,
            } => write!(f, "{step} failed: {source}"),
            ReconcileError::Precondition(msg) => write!(f, "precondition violated: {msg}"),
            ReconcileError::DeadlineExceeded(d) => {
                write!(f, "run deadline of {}s exceeded", d.as_secs_f64())
            }
            ReconcileError::TaskFailed(msg) => write!(f, "worker task failed: {msg}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TransitionError> for ReconcileError {
    fn from(e: TransitionError) -> Self {
        ReconcileError::Precondition(e.to_string())
    }
}
