//! acp-reconcile
//!
//! Converges the remote application fleet onto the configured desired state.
//!
//! Desired state is the tree platform → application → sign type; each leaf is
//! one variant identified by its composite key `<application>-<signType>`.
//! For every variant the engine ensures:
//! - an application named after the composite key exists, and
//! - that application has at least one repository binding.
//!
//! Only creations are ever issued. Existing applications and bindings are
//! never compared, mutated or deleted, so repeated runs are idempotent.

mod engine;
mod error;
mod index;
mod state;
mod types;

pub use engine::{ReconcileOptions, Reconciler};
pub use error::{ErrorKind, ReconcileError, Step};
pub use index::ApplicationIndex;
pub use state::{TransitionError, VariantEvent, VariantState};
pub use types::*;
