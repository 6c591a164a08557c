//! Typed request and response records, one per endpoint shape.
//!
//! Required fields fail decoding when absent; everything the engine does not
//! rely on is optional. Unknown extra fields are tolerated.

use serde::{Deserialize, Serialize};

/// `GET /user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<String>,
    pub name: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Element of `GET /orgs/{org}/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUser {
    pub name: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOwner {
    pub id: Option<String>,
    pub name: String,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// An application as listed or created under an organization.
///
/// `name` is unique within the owner; variants created by the reconciler are
/// named `<application>-<signType>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: Option<String>,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub owner: AppOwner,
    pub platform: String,
    pub os: String,
}

/// Body of `POST /orgs/{org}/apps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApp {
    pub description: String,
    pub display_name: String,
    pub name: String,
    pub platform: String,
    pub os: String,
}

impl NewApp {
    /// Creation body for one sign-type variant of an application.
    pub fn for_variant(
        os: &str,
        sign_type: &str,
        app_name: &str,
        variant_name: &str,
        platform: &str,
    ) -> Self {
        Self {
            description: String::new(),
            display_name: format!("AUTO: {app_name} - {sign_type}"),
            name: variant_name.to_string(),
            platform: platform.to_string(),
            os: os.to_string(),
        }
    }
}

/// A repository binding (`repo_config`) attached to one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub id: Option<String>,
    pub repo_url: String,
    pub state: Option<String>,
}

/// Body of `POST /apps/{owner}/{app}/repo_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRepoConfig {
    pub repo_url: String,
}
