//! Read-only commands: `users`, `config-hash`, `config-show`.

use acp_api::ManagementApi;
use anyhow::{Context, Result};

use super::{build_client, load_config, ClientArgs};

pub async fn users(config_paths: Vec<String>, client: ClientArgs) -> Result<()> {
    let (_, config) = load_config(&config_paths)?;
    let api = build_client(&config, &client)?;
    let users = api
        .get_org_users(&config.organization)
        .await
        .with_context(|| format!("list users of {}", config.organization))?;
    for u in users {
        println!(
            "user={} role={} email={}",
            u.name,
            u.role.as_deref().unwrap_or(""),
            u.email.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn config_hash(paths: Vec<String>) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = acp_config::load_layered(&path_refs)?;
    let shown = acp_config::redacted_json(&loaded.config_json);
    println!("config_hash={}", loaded.config_hash);
    println!(
        "{}",
        serde_json::to_string_pretty(&shown).context("serialize config")?
    );
    Ok(())
}

pub fn config_show(config_paths: Vec<String>) -> Result<()> {
    let (loaded, config) = load_config(&config_paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serialize config")?
    );
    Ok(())
}
