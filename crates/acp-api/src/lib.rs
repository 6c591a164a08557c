//! acp-api
//!
//! Thin client for the App Center management service.
//!
//! - [`client`] performs one authenticated JSON call and classifies the
//!   outcome (success payload, service-reported failure, transport failure).
//! - [`queries`] names the fixed request shapes the reconciler needs and
//!   exposes them behind the [`ManagementApi`] trait.
//!
//! Nothing here holds state between calls beyond the HTTP connection pool.

pub mod client;
pub mod error;
pub mod queries;
pub mod retry;
pub mod types;

pub use client::{classify_body, ApiClient, ClientOptions};
pub use error::{ApiError, FailureClass};
pub use queries::{AppCenterClient, ManagementApi};
pub use retry::RetryPolicy;
pub use types::*;
