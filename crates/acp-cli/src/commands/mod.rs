//! Command handlers for `acp`.
//!
//! Shared config and client wiring lives here; command logic lives in the
//! submodules.

pub mod inspect;
pub mod reconcile;

use std::time::Duration;

use acp_api::{ApiClient, AppCenterClient, ClientOptions, RetryPolicy};
use acp_config::{LoadedConfig, ProvisionConfig};
use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

/// Options for commands that talk to the management service.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Per-request timeout in seconds
    #[arg(long = "call-timeout-secs", default_value_t = 30)]
    pub call_timeout_secs: u64,

    /// Attempts per request, including the first (1 disables retries)
    #[arg(long = "max-attempts", default_value_t = 3)]
    pub max_attempts: u32,

    /// Send requests here instead of https://<api.host>/<api.version>
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
}

/// Merge config files, then overlay the process environment and validate.
///
/// Everything here runs before any network call, so an invalid
/// configuration never reaches the service.
pub fn load_config(config_paths: &[String]) -> Result<(LoadedConfig, ProvisionConfig)> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = acp_config::load_layered(&path_refs)?;
    let config = acp_config::resolve_from_process_env(&loaded.config_json)?;
    debug!(config_hash = %loaded.config_hash, "configuration resolved");
    Ok((loaded, config))
}

pub fn build_client(config: &ProvisionConfig, args: &ClientArgs) -> Result<AppCenterClient> {
    let opts = ClientOptions {
        call_timeout: Duration::from_secs(args.call_timeout_secs),
        retry: RetryPolicy::default().with_max_attempts(args.max_attempts),
    };
    let api = match &args.base_url {
        Some(url) => ApiClient::new_with_base_url(url.clone(), config.token.clone(), opts),
        None => ApiClient::new(&config.api, config.token.clone(), opts),
    }
    .context("failed to build API client")?;
    debug!(base_url = api.base_url(), "api client ready");
    Ok(AppCenterClient::new(api))
}
