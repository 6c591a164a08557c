use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use acp_api::{App, AppOwner, ApiError, ManagementApi, NewApp, OrgUser, RepoConfig, User};
use async_trait::async_trait;

/// Shorthand for a service-reported failure.
pub fn service_error(status: u16, code: &str, message: &str) -> ApiError {
    ApiError::Service {
        status,
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Every call the fake received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    GetUser,
    GetOrgUsers { org: String },
    GetOrgApps { org: String },
    GetRepoConfigs { owner: String, app: String },
    CreateApp { org: String, body: NewApp },
    CreateRepo { owner: String, app: String, repo_url: String },
}

impl ApiCall {
    pub fn kind(&self) -> CallKind {
        match self {
            ApiCall::GetUser => CallKind::GetUser,
            ApiCall::GetOrgUsers { .. } => CallKind::GetOrgUsers,
            ApiCall::GetOrgApps { .. } => CallKind::GetOrgApps,
            ApiCall::GetRepoConfigs { .. } => CallKind::GetRepoConfigs,
            ApiCall::CreateApp { .. } => CallKind::CreateApp,
            ApiCall::CreateRepo { .. } => CallKind::CreateRepo,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, ApiCall::CreateApp { .. } | ApiCall::CreateRepo { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetUser,
    GetOrgUsers,
    GetOrgApps,
    GetRepoConfigs,
    CreateApp,
    CreateRepo,
}

#[derive(Default)]
struct State {
    apps: BTreeMap<String, App>,
    repos: BTreeMap<String, Vec<RepoConfig>>,
    org_users: Vec<OrgUser>,
    calls: Vec<ApiCall>,
    fail_next: HashMap<CallKind, ApiError>,
    fail_create_for: HashMap<String, ApiError>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory management service.
///
/// Applications created through it show up in later listings; bindings
/// created through it show up in later binding queries. With
/// [`strict_owners`](Self::strict_owners) binding calls addressed to anyone
/// but the application's owner fail with 404 like the real service.
#[derive(Clone)]
pub struct FakeAppCenter {
    user: User,
    org: String,
    latency: Option<Duration>,
    strict_owners: bool,
    state: Arc<Mutex<State>>,
}

impl FakeAppCenter {
    pub fn new(user_name: &str, org: &str) -> Self {
        Self {
            user: User {
                id: None,
                name: user_name.to_string(),
                display_name: Some(user_name.to_string()),
                email: None,
            },
            org: org.to_string(),
            latency: None,
            strict_owners: false,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Seed an application owned by the organization.
    pub fn with_app(self, name: &str) -> Self {
        let org = self.org.clone();
        self.with_app_owned_by(name, &org)
    }

    pub fn with_app_owned_by(self, name: &str, owner: &str) -> Self {
        let app = Self::org_app(owner, name, "iOS", "Objective-C-Swift");
        self.lock().apps.insert(name.to_string(), app);
        self
    }

    /// Seed a binding on an application.
    pub fn with_repo(self, app: &str, repo_url: &str) -> Self {
        self.lock()
            .repos
            .entry(app.to_string())
            .or_default()
            .push(RepoConfig {
                id: None,
                repo_url: repo_url.to_string(),
                state: Some("active".to_string()),
            });
        self
    }

    pub fn with_org_user(self, name: &str, role: &str) -> Self {
        self.lock().org_users.push(OrgUser {
            name: name.to_string(),
            display_name: None,
            email: None,
            role: Some(role.to_string()),
        });
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn strict_owners(mut self) -> Self {
        self.strict_owners = true;
        self
    }

    /// Fail the next call of `kind` once with `err`.
    pub fn fail_next(&self, kind: CallKind, err: ApiError) {
        self.lock().fail_next.insert(kind, err);
    }

    /// Fail every creation of the application named `name`.
    pub fn fail_create_app_for(&self, name: &str, err: ApiError) {
        self.lock().fail_create_for.insert(name.to_string(), err);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn create_app_count(&self) -> usize {
        self.count(CallKind::CreateApp)
    }

    pub fn create_repo_count(&self) -> usize {
        self.count(CallKind::CreateRepo)
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn app_names(&self) -> Vec<String> {
        self.lock().apps.keys().cloned().collect()
    }

    pub fn repos_for(&self, app: &str) -> Vec<RepoConfig> {
        self.lock().repos.get(app).cloned().unwrap_or_default()
    }

    /// Highest number of calls observed in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn org_app(org: &str, name: &str, os: &str, platform: &str) -> App {
        App {
            id: Some(format!("id-{name}")),
            name: name.to_string(),
            display_name: Some(name.to_string()),
            description: None,
            owner: AppOwner {
                id: None,
                name: org.to_string(),
                display_name: None,
                kind: Some("org".to_string()),
            },
            platform: platform.to_string(),
            os: os.to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Record the call, apply latency and injected failures.
    async fn enter(&self, call: ApiCall) -> Result<(), ApiError> {
        let kind = call.kind();
        let injected = {
            let mut st = self.lock();
            st.calls.push(call);
            st.in_flight += 1;
            st.max_in_flight = st.max_in_flight.max(st.in_flight);
            st.fail_next.remove(&kind)
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.lock().in_flight -= 1;
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ManagementApi for FakeAppCenter {
    async fn get_user(&self) -> Result<User, ApiError> {
        self.enter(ApiCall::GetUser).await?;
        Ok(self.user.clone())
    }

    async fn get_org_users(&self, org: &str) -> Result<Vec<OrgUser>, ApiError> {
        self.enter(ApiCall::GetOrgUsers { org: org.to_string() }).await?;
        Ok(self.lock().org_users.clone())
    }

    async fn get_org_apps(&self, org: &str) -> Result<Vec<App>, ApiError> {
        self.enter(ApiCall::GetOrgApps { org: org.to_string() }).await?;
        if org != self.org {
            return Err(service_error(404, "NotFound", "organization not found"));
        }
        Ok(self.lock().apps.values().cloned().collect())
    }

    async fn get_repo_configs(&self, owner: &str, app: &str) -> Result<Vec<RepoConfig>, ApiError> {
        self.enter(ApiCall::GetRepoConfigs {
            owner: owner.to_string(),
            app: app.to_string(),
        })
        .await?;
        Ok(self.repos_for(app))
    }

    async fn create_app(&self, org: &str, body: &NewApp) -> Result<App, ApiError> {
        self.enter(ApiCall::CreateApp {
            org: org.to_string(),
            body: body.clone(),
        })
        .await?;
        let mut st = self.lock();
        if let Some(err) = st.fail_create_for.get(&body.name) {
            return Err(err.clone());
        }
        if st.apps.contains_key(&body.name) {
            return Err(service_error(409, "Conflict", "application already exists"));
        }
        let app = Self::org_app(org, &body.name, &body.os, &body.platform);
        st.apps.insert(body.name.clone(), app.clone());
        Ok(app)
    }

    async fn create_repo_config(
        &self,
        owner: &str,
        app: &str,
        repo_url: &str,
    ) -> Result<RepoConfig, ApiError> {
        self.enter(ApiCall::CreateRepo {
            owner: owner.to_string(),
            app: app.to_string(),
            repo_url: repo_url.to_string(),
        })
        .await?;
        let mut st = self.lock();
        let owned_by = st.apps.get(app).map(|a| a.owner.name.clone());
        match owned_by {
            None => return Err(service_error(404, "NotFound", "application not found")),
            Some(real) if self.strict_owners && real != owner => {
                return Err(service_error(404, "NotFound", "application not found"));
            }
            Some(_) => {}
        }
        let binding = RepoConfig {
            id: Some(format!("repo-{app}")),
            repo_url: repo_url.to_string(),
            state: Some("active".to_string()),
        };
        st.repos
            .entry(app.to_string())
            .or_default()
            .push(binding.clone());
        Ok(binding)
    }
}
