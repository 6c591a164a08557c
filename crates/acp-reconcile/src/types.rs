use acp_config::ProvisionConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::VariantState;

/// `<application>-<signType>`: the remote name of a variant and its index key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(app_name: &str, sign_type: &str) -> Self {
        Self(format!("{app_name}-{sign_type}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One leaf of the desired-state tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantTarget {
    pub key: CompositeKey,
    /// Platform identifier (`os` of the created application).
    pub os: String,
    pub app_name: String,
    pub sign_type: String,
    /// Remote platform value of the application (e.g. `Objective-C-Swift`).
    pub app_platform: String,
    pub repo_url: String,
}

/// Flatten the desired tree in configuration order: platform, then declared
/// application order, then sign-type order.
pub fn desired_variants(config: &ProvisionConfig) -> Vec<VariantTarget> {
    let mut out = Vec::new();
    for platform in &config.platforms {
        for app in &platform.applications {
            for sign_type in app.effective_sign_types(platform) {
                out.push(VariantTarget {
                    key: CompositeKey::new(&app.name, sign_type),
                    os: platform.os.clone(),
                    app_name: app.name.clone(),
                    sign_type: sign_type.clone(),
                    app_platform: app.platform.clone(),
                    repo_url: app.git.clone(),
                });
            }
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppAction {
    Existing,
    Created,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepoAction {
    /// At least one binding was already present; its URL is not compared.
    AlreadyBound { bindings: usize },
    Bound { repo_url: String },
}

/// Outcome of one variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariantReport {
    pub key: CompositeKey,
    pub os: String,
    pub app_name: String,
    pub sign_type: String,
    pub app: AppAction,
    pub repo: RepoAction,
    pub final_state: VariantState,
}

/// Outcome of a full run, variants in configuration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub user: String,
    /// Applications found by the initial listing.
    pub existing_apps: usize,
    pub variants: Vec<VariantReport>,
    /// Names held by the application index at the end of the run (sorted).
    pub indexed_apps: Vec<String>,
}

impl ReconcileReport {
    pub fn apps_created(&self) -> usize {
        self.variants
            .iter()
            .filter(|v| v.app == AppAction::Created)
            .count()
    }

    pub fn repos_created(&self) -> usize {
        self.variants
            .iter()
            .filter(|v| matches!(v.repo, RepoAction::Bound { .. }))
            .count()
    }

    /// `true` when the run issued no creation at all.
    pub fn is_noop(&self) -> bool {
        self.apps_created() == 0 && self.repos_created() == 0
    }
}

/// What a run would do for one variant, computed from reads only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedVariant {
    pub key: CompositeKey,
    pub os: String,
    pub create_app: bool,
    pub bind_repo: bool,
    pub repo_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub user: String,
    pub existing_apps: usize,
    pub variants: Vec<PlannedVariant>,
}

impl ReconcilePlan {
    /// Number of creation calls a run would issue.
    pub fn creations(&self) -> usize {
        self.variants
            .iter()
            .map(|v| usize::from(v.create_app) + usize::from(v.bind_repo))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_config::{ApiSettings, ApiToken, ApplicationConfig, PlatformConfig, RepoOwnerPolicy};

    fn config() -> ProvisionConfig {
        let app = |name: &str, own: Option<Vec<&str>>| ApplicationConfig {
            name: name.to_string(),
            platform: "Objective-C-Swift".to_string(),
            git: format!("https://example.com/{name}.git"),
            sign_types: own.map(|v| v.into_iter().map(String::from).collect()),
        };
        ProvisionConfig {
            organization: "acme".to_string(),
            api: ApiSettings {
                env: "PROD".to_string(),
                host: "api.appcenter.ms".to_string(),
                version: "v0.1".to_string(),
            },
            token: ApiToken::new("t"),
            xcode_version: "10.1".to_string(),
            repo_owner: RepoOwnerPolicy::AuthenticatedUser,
            platforms: vec![PlatformConfig {
                os: "iOS".to_string(),
                sign_types: vec!["dev".to_string(), "prod".to_string()],
                branches: vec![],
                applications: vec![app("Zed", None), app("Alpha", Some(vec!["adhoc"]))],
            }],
        }
    }

    #[test]
    fn composite_key_is_name_dash_sign_type() {
        assert_eq!(CompositeKey::new("A", "S").as_str(), "A-S");
        assert_eq!(CompositeKey::new("App1", "prod").to_string(), "App1-prod");
    }

    #[test]
    fn variants_follow_configuration_order_and_overrides() {
        let keys: Vec<String> = desired_variants(&config())
            .into_iter()
            .map(|v| v.key.to_string())
            .collect();
        assert_eq!(keys, vec!["Zed-dev", "Zed-prod", "Alpha-adhoc"]);
    }

    #[test]
    fn variant_carries_application_settings() {
        let v = &desired_variants(&config())[2];
        assert_eq!(v.os, "iOS");
        assert_eq!(v.app_name, "Alpha");
        assert_eq!(v.sign_type, "adhoc");
        assert_eq!(v.app_platform, "Objective-C-Swift");
        assert_eq!(v.repo_url, "https://example.com/Alpha.git");
    }
}
