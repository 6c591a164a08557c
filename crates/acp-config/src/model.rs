//! Resolved configuration types.
//!
//! These are produced once per run by [`crate::resolve`] and consumed
//! read-only afterwards.

use serde::{Serialize, Serializer};

use crate::REDACTED;

/// Fully-resolved configuration for one provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionConfig {
    pub organization: String,
    pub api: ApiSettings,
    pub token: ApiToken,
    /// Required build-tool version (`xcodev`). Not sent anywhere yet, but a run
    /// without it is refused.
    pub xcode_version: String,
    pub repo_owner: RepoOwnerPolicy,
    /// Platforms in processing order.
    pub platforms: Vec<PlatformConfig>,
}

impl ProvisionConfig {
    pub fn platform(&self, os: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.os.eq_ignore_ascii_case(os))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiSettings {
    pub env: String,
    pub host: String,
    pub version: String,
}

impl ApiSettings {
    /// `https://<host>/<version>`; request paths are appended to this.
    pub fn base_url(&self) -> String {
        format!(
            "https://{}/{}",
            self.host.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }
}

/// API token. **Redacted in `Debug`, `Display` and serialized output.**
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl std::fmt::Display for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for ApiToken {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(REDACTED)
    }
}

/// Whose name goes into the owner segment of repo-binding creation.
///
/// Listing bindings always uses the application's own `owner.name`.
/// `AuthenticatedUser` only works when the caller owns the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoOwnerPolicy {
    #[default]
    AuthenticatedUser,
    ApplicationOwner,
}

impl RepoOwnerPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(RepoOwnerPolicy::AuthenticatedUser),
            "app" => Some(RepoOwnerPolicy::ApplicationOwner),
            _ => None,
        }
    }
}

/// Desired state for one platform (e.g. `iOS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformConfig {
    /// Platform identifier, sent as the `os` of created applications.
    pub os: String,
    pub sign_types: Vec<String>,
    pub branches: Vec<String>,
    /// Applications in declaration order.
    pub applications: Vec<ApplicationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationConfig {
    pub name: String,
    /// Remote platform value (e.g. `Objective-C-Swift`).
    pub platform: String,
    /// Source repository URL bound to every variant of this application.
    pub git: String,
    /// Per-application override of the platform sign types.
    pub sign_types: Option<Vec<String>>,
}

impl ApplicationConfig {
    /// Sign types that apply to this application: its own override when
    /// present, otherwise the platform sequence.
    pub fn effective_sign_types<'a>(&'a self, platform: &'a PlatformConfig) -> &'a [String] {
        match &self.sign_types {
            Some(own) => own,
            None => &platform.sign_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_never_prints() {
        let t = ApiToken::new("secret-value");
        assert_eq!(format!("{t:?}"), REDACTED);
        assert_eq!(t.to_string(), REDACTED);
        assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{REDACTED}\""));
        assert_eq!(t.expose(), "secret-value");
    }

    #[test]
    fn base_url_joins_host_and_version() {
        let api = ApiSettings {
            env: "PROD".to_string(),
            host: "api.appcenter.ms/".to_string(),
            version: "/v0.1".to_string(),
        };
        assert_eq!(api.base_url(), "https://api.appcenter.ms/v0.1");
    }

    #[test]
    fn repo_owner_policy_parse() {
        assert_eq!(
            RepoOwnerPolicy::parse("User"),
            Some(RepoOwnerPolicy::AuthenticatedUser)
        );
        assert_eq!(
            RepoOwnerPolicy::parse("app"),
            Some(RepoOwnerPolicy::ApplicationOwner)
        );
        assert_eq!(RepoOwnerPolicy::parse("org"), None);
    }

    #[test]
    fn application_override_replaces_platform_sign_types() {
        let platform = PlatformConfig {
            os: "iOS".to_string(),
            sign_types: vec!["dev".to_string(), "prod".to_string()],
            branches: vec![],
            applications: vec![],
        };
        let plain = ApplicationConfig {
            name: "A".to_string(),
            platform: "Objective-C-Swift".to_string(),
            git: "https://example.com/a.git".to_string(),
            sign_types: None,
        };
        let custom = ApplicationConfig {
            sign_types: Some(vec!["adhoc".to_string()]),
            ..plain.clone()
        };
        assert_eq!(plain.effective_sign_types(&platform), ["dev", "prod"]);
        assert_eq!(custom.effective_sign_types(&platform), ["adhoc"]);
    }
}
