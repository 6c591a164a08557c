//! Environment overlay, defaults and validation.
//!
//! Precedence for every overlaid field, highest first:
//! explicit environment variable → value in the merged file → default.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::env::{EnvSource, ProcessEnv};
use crate::model::{
    ApiSettings, ApiToken, ApplicationConfig, PlatformConfig, ProvisionConfig, RepoOwnerPolicy,
};

pub const DEFAULT_API_ENV: &str = "PROD";
pub const DEFAULT_API_VERSION: &str = "v0.1";

/// Platforms the engine knows how to provision.
pub const SUPPORTED_PLATFORMS: &[&str] = &["iOS"];

const INT_HOST: &str = "bifrost-int.trafficmanager.net";
const PROD_HOST: &str = "api.appcenter.ms";

/// Service host for an `api.env` value. Unrecognised environments fall back to
/// the production host.
pub fn host_for_env(env: &str) -> &'static str {
    match env {
        "INT" => INT_HOST,
        _ => PROD_HOST,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    token: Option<String>,
    #[serde(default)]
    api: RawApi,
    organization: Option<String>,
    xcodev: Option<Value>,
    #[serde(default)]
    force_update: bool,
    repo_owner: Option<String>,
    platforms: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawApi {
    env: Option<String>,
    host: Option<String>,
    version: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlatform {
    sign_types: Option<StringList>,
    branches: Option<StringList>,
    #[serde(default)]
    applications: IndexMap<String, RawApplication>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawApplication {
    platform: Option<String>,
    git: Option<String>,
    sign_types: Option<StringList>,
}

/// Either a YAML/JSON list or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringList {
    Many(Vec<String>),
    One(String),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringList::Many(v) => v
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            StringList::One(s) => split_list(&s),
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn missing(field: &str) -> anyhow::Error {
    anyhow::anyhow!("CONFIG_MISSING_FIELD: required config field '{field}' is not set")
}

/// Resolve against the real process environment.
pub fn resolve_from_process_env(config_json: &Value) -> Result<ProvisionConfig> {
    resolve(config_json, &ProcessEnv)
}

/// Apply the environment overlay to a merged document and validate it.
pub fn resolve(config_json: &Value, env: &dyn EnvSource) -> Result<ProvisionConfig> {
    let root = config_json
        .as_object()
        .context("CONFIG_INVALID: config root must be a mapping")?;
    let raw: RawConfig =
        serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: bad config shape")?;

    if raw.force_update {
        bail!(
            "CONFIG_FORCE_UPDATE_UNSUPPORTED: forceUpdate would delete and recreate \
             existing applications; deleting remote resources is not supported"
        );
    }

    let xcode_version = match raw.xcodev {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        None | Some(Value::Null) | Some(Value::String(_)) => return Err(missing("xcodev")),
        Some(other) => bail!("CONFIG_INVALID: xcodev must be a string or number, got {other}"),
    };

    let token = env
        .var("API_TOKEN")
        .or_else(|| non_blank(raw.api.token.clone()))
        .or_else(|| non_blank(raw.token.clone()))
        .ok_or_else(|| missing("api.token"))?;

    let api_env = env
        .var("API_ENV")
        .or_else(|| env.var("env"))
        .or_else(|| non_blank(raw.api.env.clone()))
        .unwrap_or_else(|| DEFAULT_API_ENV.to_string());
    let host = env
        .var("API_HOST")
        .or_else(|| non_blank(raw.api.host.clone()))
        .unwrap_or_else(|| host_for_env(&api_env).to_string());
    let version = env
        .var("API_VERSION")
        .or_else(|| non_blank(raw.api.version.clone()))
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    let organization = env
        .var("ORGANIZATION")
        .or_else(|| non_blank(raw.organization.clone()))
        .ok_or_else(|| missing("organization"))?;

    let repo_owner = match non_blank(raw.repo_owner) {
        None => RepoOwnerPolicy::default(),
        Some(s) => RepoOwnerPolicy::parse(&s).with_context(|| {
            format!("CONFIG_INVALID: repoOwner '{s}'; expected one of: user | app")
        })?,
    };

    let platform_ids = raw
        .platforms
        .unwrap_or_else(|| SUPPORTED_PLATFORMS.iter().map(|p| p.to_string()).collect());

    let mut platforms = Vec::with_capacity(platform_ids.len());
    for id in platform_ids {
        let os = SUPPORTED_PLATFORMS
            .iter()
            .find(|p| p.eq_ignore_ascii_case(id.trim()))
            .with_context(|| {
                format!(
                    "CONFIG_UNSUPPORTED_PLATFORM: '{id}'; supported: {}",
                    SUPPORTED_PLATFORMS.join(" | ")
                )
            })?;

        let section = root
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(os))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| missing(os))?;
        let raw_platform: RawPlatform = serde_json::from_value(section)
            .with_context(|| format!("CONFIG_INVALID: bad '{os}' section"))?;

        platforms.push(resolve_platform(os, raw_platform, env)?);
    }

    let api = ApiSettings {
        env: api_env,
        host,
        version,
    };
    debug!(
        env = %api.env,
        host = %api.host,
        version = %api.version,
        organization = %organization,
        "config resolved"
    );

    Ok(ProvisionConfig {
        organization,
        api,
        token: ApiToken::new(token),
        xcode_version,
        repo_owner,
        platforms,
    })
}

fn resolve_platform(os: &str, raw: RawPlatform, env: &dyn EnvSource) -> Result<PlatformConfig> {
    let prefix = os.to_ascii_uppercase();

    let sign_types = match env.var(&format!("{prefix}_SIGN_TYPES")) {
        Some(s) => split_list(&s),
        None => raw.sign_types.map(StringList::into_vec).unwrap_or_default(),
    };
    let branches = match env.var(&format!("{prefix}_BRANCHES")) {
        Some(s) => split_list(&s),
        None => raw.branches.map(StringList::into_vec).unwrap_or_default(),
    };

    let mut applications = Vec::with_capacity(raw.applications.len());
    for (name, app) in raw.applications {
        let field = |f: &str| format!("{os}.applications.{name}.{f}");

        let platform = non_blank(app.platform).ok_or_else(|| missing(&field("platform")))?;
        let git = non_blank(app.git).ok_or_else(|| missing(&field("git")))?;
        let own_sign_types = app.sign_types.map(StringList::into_vec);

        let effective = own_sign_types.as_ref().unwrap_or(&sign_types);
        if effective.is_empty() {
            bail!("CONFIG_MISSING_FIELD: no sign types configured for '{os}' application '{name}'");
        }

        applications.push(ApplicationConfig {
            name,
            platform,
            git,
            sign_types: own_sign_types,
        });
    }

    Ok(PlatformConfig {
        os: os.to_string(),
        sign_types,
        branches,
        applications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "organization": "acme",
            "xcodev": "10.1",
            "api": {"token": "file-token"},
            "iOS": {
                "signTypes": ["dev", "prod"],
                "applications": {
                    "App1": {"platform": "Objective-C-Swift", "git": "https://example.com/app1.git"}
                }
            }
        })
    }

    #[test]
    fn defaults_apply_when_nothing_set() {
        let cfg = resolve(&base(), &MapEnv::new()).unwrap();
        assert_eq!(cfg.api.env, "PROD");
        assert_eq!(cfg.api.host, "api.appcenter.ms");
        assert_eq!(cfg.api.version, "v0.1");
        assert_eq!(cfg.token.expose(), "file-token");
        assert_eq!(cfg.repo_owner, RepoOwnerPolicy::AuthenticatedUser);
        assert_eq!(cfg.platforms.len(), 1);
        assert_eq!(cfg.platforms[0].os, "iOS");
    }

    #[test]
    fn host_derivation_table() {
        assert_eq!(host_for_env("INT"), "bifrost-int.trafficmanager.net");
        assert_eq!(host_for_env("STAGE"), "api.appcenter.ms");
        assert_eq!(host_for_env("PROD"), "api.appcenter.ms");
        assert_eq!(host_for_env("whatever"), "api.appcenter.ms");
    }

    #[test]
    fn env_int_derives_int_host() {
        let cfg = resolve(&base(), &MapEnv::new().with("API_ENV", "INT")).unwrap();
        assert_eq!(cfg.api.host, "bifrost-int.trafficmanager.net");
    }

    #[test]
    fn legacy_lowercase_env_variable_is_honoured() {
        let cfg = resolve(&base(), &MapEnv::new().with("env", "INT")).unwrap();
        assert_eq!(cfg.api.env, "INT");
    }

    #[test]
    fn file_host_beats_derived_host_and_env_beats_file() {
        let mut doc = base();
        doc["api"]["env"] = json!("INT");
        doc["api"]["host"] = json!("file.example.com");
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        assert_eq!(cfg.api.host, "file.example.com");

        let cfg = resolve(&doc, &MapEnv::new().with("API_HOST", "env.example.com")).unwrap();
        assert_eq!(cfg.api.host, "env.example.com");
    }

    #[test]
    fn env_token_beats_file_token() {
        let cfg = resolve(&base(), &MapEnv::new().with("API_TOKEN", "env-token")).unwrap();
        assert_eq!(cfg.token.expose(), "env-token");
    }

    #[test]
    fn top_level_token_is_accepted() {
        let mut doc = base();
        doc["api"] = json!({});
        doc["token"] = json!("top");
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        assert_eq!(cfg.token.expose(), "top");
    }

    #[test]
    fn missing_xcodev_is_fatal() {
        let mut doc = base();
        doc.as_object_mut().unwrap().remove("xcodev");
        let err = resolve(&doc, &MapEnv::new()).unwrap_err().to_string();
        assert!(err.contains("CONFIG_MISSING_FIELD"), "{err}");
        assert!(err.contains("xcodev"), "{err}");
    }

    #[test]
    fn wrongly_typed_xcodev_is_invalid_not_missing() {
        for bad in [json!(true), json!(["10.1"]), json!({"v": "10.1"})] {
            let mut doc = base();
            doc["xcodev"] = bad;
            let err = resolve(&doc, &MapEnv::new()).unwrap_err().to_string();
            assert!(err.contains("CONFIG_INVALID"), "{err}");
            assert!(!err.contains("CONFIG_MISSING_FIELD"), "{err}");
            assert!(err.contains("xcodev"), "{err}");
        }
    }

    #[test]
    fn numeric_xcodev_is_accepted() {
        let mut doc = base();
        doc["xcodev"] = json!(11);
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        assert_eq!(cfg.xcode_version, "11");
    }

    #[test]
    fn force_update_is_rejected() {
        let mut doc = base();
        doc["forceUpdate"] = json!(true);
        let err = resolve(&doc, &MapEnv::new()).unwrap_err().to_string();
        assert!(err.contains("CONFIG_FORCE_UPDATE_UNSUPPORTED"), "{err}");
    }

    #[test]
    fn sign_types_overlay_splits_commas() {
        let env = MapEnv::new().with("IOS_SIGN_TYPES", "adhoc, store");
        let cfg = resolve(&base(), &env).unwrap();
        assert_eq!(cfg.platforms[0].sign_types, vec!["adhoc", "store"]);
    }

    #[test]
    fn lowercase_platform_section_is_found() {
        let mut doc = base();
        let section = doc.as_object_mut().unwrap().remove("iOS").unwrap();
        doc["ios"] = section;
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        assert_eq!(cfg.platforms[0].applications[0].name, "App1");
    }

    #[test]
    fn unsupported_platform_is_rejected() {
        let mut doc = base();
        doc["platforms"] = json!(["Android"]);
        let err = resolve(&doc, &MapEnv::new()).unwrap_err().to_string();
        assert!(err.contains("CONFIG_UNSUPPORTED_PLATFORM"), "{err}");
    }

    #[test]
    fn application_without_git_is_rejected() {
        let mut doc = base();
        doc["iOS"]["applications"]["App1"]
            .as_object_mut()
            .unwrap()
            .remove("git");
        let err = resolve(&doc, &MapEnv::new()).unwrap_err().to_string();
        assert!(err.contains("iOS.applications.App1.git"), "{err}");
    }

    #[test]
    fn application_sign_type_override_is_kept() {
        let mut doc = base();
        doc["iOS"]["applications"]["App1"]["signTypes"] = json!(["enterprise"]);
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        let platform = &cfg.platforms[0];
        let app = &platform.applications[0];
        assert_eq!(app.effective_sign_types(platform), ["enterprise"]);
    }

    #[test]
    fn no_sign_types_at_all_is_rejected() {
        let mut doc = base();
        doc["iOS"].as_object_mut().unwrap().remove("signTypes");
        assert!(resolve(&doc, &MapEnv::new()).is_err());
    }

    #[test]
    fn bad_repo_owner_is_rejected() {
        let mut doc = base();
        doc["repoOwner"] = json!("org");
        assert!(resolve(&doc, &MapEnv::new()).is_err());

        doc["repoOwner"] = json!("app");
        let cfg = resolve(&doc, &MapEnv::new()).unwrap();
        assert_eq!(cfg.repo_owner, RepoOwnerPolicy::ApplicationOwner);
    }
}
