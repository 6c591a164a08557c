//! Named resource queries.
//!
//! Each method is a pure pass-through with a fixed method/path/body shape.
//! None of them touch local state; errors come back exactly as the client
//! classified them.

use std::borrow::Cow;

use async_trait::async_trait;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::types::{App, NewApp, NewRepoConfig, OrgUser, RepoConfig, User};

/// Management-service operations the reconciler depends on.
///
/// Object safe so callers can hold an `Arc<dyn ManagementApi>`; `Send + Sync`
/// so one instance can serve concurrent reconcile tasks.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// `GET /user`: the authenticated caller.
    async fn get_user(&self) -> Result<User, ApiError>;

    /// `GET /orgs/{org}/users`
    async fn get_org_users(&self, org: &str) -> Result<Vec<OrgUser>, ApiError>;

    /// `GET /orgs/{org}/apps`
    async fn get_org_apps(&self, org: &str) -> Result<Vec<App>, ApiError>;

    /// `GET /apps/{owner}/{app}/repo_config`. Empty means unattached.
    async fn get_repo_configs(&self, owner: &str, app: &str) -> Result<Vec<RepoConfig>, ApiError>;

    /// `POST /orgs/{org}/apps`
    async fn create_app(&self, org: &str, app: &NewApp) -> Result<App, ApiError>;

    /// `POST /apps/{owner}/{app}/repo_config` with `{ "repo_url": ... }`
    async fn create_repo_config(
        &self,
        owner: &str,
        app: &str,
        repo_url: &str,
    ) -> Result<RepoConfig, ApiError>;
}

/// [`ManagementApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct AppCenterClient {
    api: ApiClient,
}

impl AppCenterClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl ManagementApi for AppCenterClient {
    async fn get_user(&self) -> Result<User, ApiError> {
        self.api.get("/user").await
    }

    async fn get_org_users(&self, org: &str) -> Result<Vec<OrgUser>, ApiError> {
        self.api.get(&format!("/orgs/{}/users", segment(org))).await
    }

    async fn get_org_apps(&self, org: &str) -> Result<Vec<App>, ApiError> {
        self.api.get(&format!("/orgs/{}/apps", segment(org))).await
    }

    async fn get_repo_configs(&self, owner: &str, app: &str) -> Result<Vec<RepoConfig>, ApiError> {
        self.api.get(&repo_config_path(owner, app)).await
    }

    async fn create_app(&self, org: &str, app: &NewApp) -> Result<App, ApiError> {
        self.api
            .post(&format!("/orgs/{}/apps", segment(org)), app)
            .await
    }

    async fn create_repo_config(
        &self,
        owner: &str,
        app: &str,
        repo_url: &str,
    ) -> Result<RepoConfig, ApiError> {
        let body = NewRepoConfig {
            repo_url: repo_url.to_string(),
        };
        self.api.post(&repo_config_path(owner, app), &body).await
    }
}

fn repo_config_path(owner: &str, app: &str) -> String {
    format!("/apps/{}/{}/repo_config", segment(owner), segment(app))
}

/// Percent-encode one path segment (RFC 3986 unreserved characters pass).
fn segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}
