//! Test doubles for the management service and configuration builders.
//!
//! Only used from `[dev-dependencies]`; nothing here ships in the binary.

mod fake_service;
mod fixture;

pub use fake_service::{service_error, ApiCall, CallKind, FakeAppCenter};
pub use fixture::ConfigFixture;
