//! Per-variant convergence state machine.
//!
//! ```text
//!   Pending ──AppFound──────────────────────► AppResolved
//!      │                                          │   │
//!   CreateAppRequested                    RepoFound   BindRepoRequested
//!      ▼                                          │   ▼
//!   CreatingApp ──AppCreated──► AppResolved       │  BindingRepo
//!                                                 ▼   │ RepoBound
//!                                            Converged ◄┘   (terminal)
//! ```
//!
//! A failed remote call leaves the variant in its in-flight state
//! (`CreatingApp` or `BindingRepo`); the run aborts from there.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantState {
    /// Not yet looked up in the application index.
    Pending,
    /// Application creation request in flight.
    CreatingApp,
    /// The application exists (found or created); bindings not yet checked.
    AppResolved,
    /// Repository binding request in flight.
    BindingRepo,
    /// Application exists and has at least one binding. **Terminal.**
    Converged,
}

impl VariantState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantEvent {
    AppFound,
    CreateAppRequested,
    AppCreated,
    RepoFound,
    BindRepoRequested,
    RepoBound,
}

/// An event that cannot legally be applied in the current state. Indicates an
/// engine bug; the run must stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: VariantState,
    pub event: VariantEvent,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal variant transition: {:?} + {:?}",
            self.from, self.event
        )
    }
}

impl std::error::Error for TransitionError {}

/// Tracks one variant through its lifecycle and remembers whether it
/// created the application.
#[derive(Debug, Clone)]
pub(crate) struct VariantProgress {
    pub state: VariantState,
    pub app_created: bool,
}

impl VariantProgress {
    pub fn new() -> Self {
        Self {
            state: VariantState::Pending,
            app_created: false,
        }
    }

    pub fn apply(&mut self, event: VariantEvent) -> Result<(), TransitionError> {
        use VariantEvent::*;
        use VariantState::*;

        self.state = match (self.state, event) {
            (Pending, AppFound) => AppResolved,
            (Pending, CreateAppRequested) => CreatingApp,
            (CreatingApp, AppCreated) => {
                self.app_created = true;
                AppResolved
            }
            (AppResolved, RepoFound) => Converged,
            (AppResolved, BindRepoRequested) => BindingRepo,
            (BindingRepo, RepoBound) => Converged,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(())
    }
}
