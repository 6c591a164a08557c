use acp_config::{
    ApiSettings, ApiToken, ApplicationConfig, PlatformConfig, ProvisionConfig, RepoOwnerPolicy,
};

/// Builder for resolved configurations.
///
/// ```ignore
/// let cfg = ConfigFixture::new("acme")
///     .platform("iOS", &["dev", "prod"])
///     .app("iOS", "App1", "https://example.com/app1.git")
///     .build();
/// ```
pub struct ConfigFixture {
    config: ProvisionConfig,
}

impl ConfigFixture {
    pub fn new(organization: &str) -> Self {
        Self {
            config: ProvisionConfig {
                organization: organization.to_string(),
                api: ApiSettings {
                    env: "PROD".to_string(),
                    host: "api.appcenter.ms".to_string(),
                    version: "v0.1".to_string(),
                },
                token: ApiToken::new("test-token"),
                xcode_version: "10.1".to_string(),
                repo_owner: RepoOwnerPolicy::default(),
                platforms: Vec::new(),
            },
        }
    }

    /// Add a platform section, or replace the sign types of an existing one.
    pub fn platform(mut self, os: &str, sign_types: &[&str]) -> Self {
        let sign_types: Vec<String> = sign_types.iter().map(|s| s.to_string()).collect();
        match self.config.platforms.iter_mut().find(|p| p.os == os) {
            Some(p) => p.sign_types = sign_types,
            None => self.config.platforms.push(PlatformConfig {
                os: os.to_string(),
                sign_types,
                branches: Vec::new(),
                applications: Vec::new(),
            }),
        }
        self
    }

    pub fn app(self, os: &str, name: &str, git: &str) -> Self {
        self.push_app(os, name, git, None)
    }

    /// Application with its own sign-type list.
    pub fn app_with_sign_types(self, os: &str, name: &str, git: &str, sign_types: &[&str]) -> Self {
        let own = sign_types.iter().map(|s| s.to_string()).collect();
        self.push_app(os, name, git, Some(own))
    }

    pub fn repo_owner(mut self, policy: RepoOwnerPolicy) -> Self {
        self.config.repo_owner = policy;
        self
    }

    pub fn build(self) -> ProvisionConfig {
        self.config
    }

    fn push_app(mut self, os: &str, name: &str, git: &str, own: Option<Vec<String>>) -> Self {
        if self.config.platform(os).is_none() {
            self = self.platform(os, &[]);
        }
        let app = ApplicationConfig {
            name: name.to_string(),
            platform: "Objective-C-Swift".to_string(),
            git: git.to_string(),
            sign_types: own,
        };
        if let Some(p) = self.config.platforms.iter_mut().find(|p| p.os == os) {
            p.applications.push(app);
        }
        self
    }
}
