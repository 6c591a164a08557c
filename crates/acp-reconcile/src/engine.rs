use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use acp_api::{App, ManagementApi, NewApp};
use acp_config::{ProvisionConfig, RepoOwnerPolicy};
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Step};
use crate::index::ApplicationIndex;
use crate::state::{VariantEvent, VariantProgress};
use crate::types::{
    desired_variants, AppAction, PlannedVariant, ReconcilePlan, ReconcileReport, RepoAction,
    VariantReport, VariantTarget,
};

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum variant groups converged at once. `1` processes variants
    /// strictly in configuration order.
    pub concurrency: usize,
    /// Whole-run deadline. `None` waits as long as the calls take.
    pub run_deadline: Option<Duration>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            run_deadline: None,
        }
    }
}

/// Shared by every variant of one run.
struct RunContext {
    organization: String,
    user_name: String,
    repo_owner: RepoOwnerPolicy,
    index: Mutex<ApplicationIndex>,
}

pub struct Reconciler {
    api: Arc<dyn ManagementApi>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ManagementApi>, options: ReconcileOptions) -> Self {
        Self { api, options }
    }

    /// Converge the organization onto `config`.
    ///
    /// Fetches the caller and the application listing once, then walks every
    /// variant. The first error aborts the run; in concurrent mode in-flight
    /// siblings are cancelled.
    pub async fn run(&self, config: &ProvisionConfig) -> Result<ReconcileReport, ReconcileError> {
        match self.options.run_deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_inner(config))
                .await
                .map_err(|_| ReconcileError::DeadlineExceeded(limit))?,
            None => self.run_inner(config).await,
        }
    }

    async fn run_inner(&self, config: &ProvisionConfig) -> Result<ReconcileReport, ReconcileError> {
        let started_at = Utc::now();

        let user = self
            .api
            .get_user()
            .await
            .map_err(|e| ReconcileError::api(Step::FetchUser, None, e))?;
        info!(user = %user.name, "authenticated");

        let listing = self
            .api
            .get_org_apps(&config.organization)
            .await
            .map_err(|e| ReconcileError::api(Step::ListApps, None, e))?;
        let index = ApplicationIndex::from_listing(listing);
        let existing_apps = index.len();
        info!(
            organization = %config.organization,
            existing_apps,
            "application listing loaded"
        );

        let ctx = Arc::new(RunContext {
            organization: config.organization.clone(),
            user_name: user.name.clone(),
            repo_owner: config.repo_owner,
            index: Mutex::new(index),
        });

        let targets = desired_variants(config);
        info!(variants = targets.len(), concurrency = self.options.concurrency, "reconciling");

        let variants = if self.options.concurrency <= 1 {
            let mut out = Vec::with_capacity(targets.len());
            for target in &targets {
                out.push(converge_variant(self.api.as_ref(), &ctx, target).await?);
            }
            out
        } else {
            self.run_concurrent(&ctx, targets).await?
        };

        let indexed_apps = ctx.index.lock().await.names();
        Ok(ReconcileReport {
            started_at,
            finished_at: Utc::now(),
            user: user.name,
            existing_apps,
            variants,
            indexed_apps,
        })
    }

    /// Variants sharing a composite key stay in one task, in order, so the
    /// second sees the first one's creation. Distinct keys run in parallel
    /// up to the configured limit.
    async fn run_concurrent(
        &self,
        ctx: &Arc<RunContext>,
        targets: Vec<VariantTarget>,
    ) -> Result<Vec<VariantReport>, ReconcileError> {
        let total = targets.len();
        let permits = Arc::new(Semaphore::new(self.options.concurrency));
        let mut tasks = JoinSet::new();

        for group in group_by_key(targets) {
            let api = Arc::clone(&self.api);
            let ctx = Arc::clone(ctx);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ReconcileError::TaskFailed(e.to_string()))?;
                let mut done = Vec::with_capacity(group.len());
                for (position, target) in group {
                    let report = converge_variant(api.as_ref(), &ctx, &target).await?;
                    done.push((position, report));
                }
                Ok::<_, ReconcileError>(done)
            });
        }

        let mut slots: Vec<Option<VariantReport>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(ReconcileError::TaskFailed(e.to_string())),
            };
            match outcome {
                Ok(done) => {
                    for (position, report) in done {
                        slots[position] = Some(report);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "aborting remaining variants");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    ReconcileError::Precondition("variant finished without a report".to_string())
                })
            })
            .collect()
    }

    /// Compute what [`run`](Self::run) would do using reads only.
    ///
    /// A variant whose application is missing is planned for both creations
    /// without listing bindings. A repeated composite key after a planned
    /// creation is treated as satisfied.
    pub async fn plan(&self, config: &ProvisionConfig) -> Result<ReconcilePlan, ReconcileError> {
        let user = self
            .api
            .get_user()
            .await
            .map_err(|e| ReconcileError::api(Step::FetchUser, None, e))?;
        let listing = self
            .api
            .get_org_apps(&config.organization)
            .await
            .map_err(|e| ReconcileError::api(Step::ListApps, None, e))?;
        let index = ApplicationIndex::from_listing(listing);

        let mut planned: HashSet<String> = HashSet::new();
        let mut variants = Vec::new();
        for target in desired_variants(config) {
            let (create_app, bind_repo) = if let Some(app) = index.get(&target.key) {
                let repos = self
                    .api
                    .get_repo_configs(&app.owner.name, &app.name)
                    .await
                    .map_err(|e| ReconcileError::api(Step::ListRepos, Some(&target.key), e))?;
                (false, repos.is_empty() && !planned.contains(target.key.as_str()))
            } else if planned.contains(target.key.as_str()) {
                (false, false)
            } else {
                (true, true)
            };
            if create_app || bind_repo {
                planned.insert(target.key.to_string());
            }
            debug!(key = %target.key, create_app, bind_repo, "planned");
            variants.push(PlannedVariant {
                key: target.key,
                os: target.os,
                create_app,
                bind_repo,
                repo_url: target.repo_url,
            });
        }

        Ok(ReconcilePlan {
            user: user.name,
            existing_apps: index.len(),
            variants,
        })
    }
}

/// Groups in order of first appearance, each holding `(position, target)`.
fn group_by_key(targets: Vec<VariantTarget>) -> Vec<Vec<(usize, VariantTarget)>> {
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<(usize, VariantTarget)>> = Vec::new();
    for (position, target) in targets.into_iter().enumerate() {
        match slot_of.get(target.key.as_str()) {
            Some(&slot) => groups[slot].push((position, target)),
            None => {
                slot_of.insert(target.key.to_string(), groups.len());
                groups.push(vec![(position, target)]);
            }
        }
    }
    groups
}

async fn converge_variant(
    api: &dyn ManagementApi,
    ctx: &RunContext,
    target: &VariantTarget,
) -> Result<VariantReport, ReconcileError> {
    let key = &target.key;
    let mut progress = VariantProgress::new();

    let known = ctx.index.lock().await.contains(key);
    if known {
        info!(key = %key, "application exists; skipping creation");
        progress.apply(VariantEvent::AppFound)?;
    } else {
        info!(key = %key, "application missing; creating");
        progress.apply(VariantEvent::CreateAppRequested)?;
        let body = NewApp::for_variant(
            &target.os,
            &target.sign_type,
            &target.app_name,
            key.as_str(),
            &target.app_platform,
        );
        let created = api
            .create_app(&ctx.organization, &body)
            .await
            .map_err(|e| ReconcileError::api(Step::CreateApp, Some(key), e))?;
        if created.name != key.as_str() {
            warn!(key = %key, returned = %created.name, "service returned a different application name");
        }
        ctx.index.lock().await.insert(key, created);
        progress.apply(VariantEvent::AppCreated)?;
        info!(key = %key, "application created");
    }

    let app: App = ctx.index.lock().await.get(key).cloned().ok_or_else(|| {
        ReconcileError::Precondition(format!("application {key} absent from index"))
    })?;

    let repos = api
        .get_repo_configs(&app.owner.name, &app.name)
        .await
        .map_err(|e| ReconcileError::api(Step::ListRepos, Some(key), e))?;

    let repo = if repos.is_empty() {
        let owner = match ctx.repo_owner {
            RepoOwnerPolicy::AuthenticatedUser => ctx.user_name.as_str(),
            RepoOwnerPolicy::ApplicationOwner => app.owner.name.as_str(),
        };
        info!(key = %key, owner, repo_url = %target.repo_url, "no repository bound; binding");
        progress.apply(VariantEvent::BindRepoRequested)?;
        api.create_repo_config(owner, &app.name, &target.repo_url)
            .await
            .map_err(|e| ReconcileError::api(Step::CreateRepo, Some(key), e))?;
        progress.apply(VariantEvent::RepoBound)?;
        RepoAction::Bound {
            repo_url: target.repo_url.clone(),
        }
    } else {
        info!(key = %key, bindings = repos.len(), "repository already bound");
        progress.apply(VariantEvent::RepoFound)?;
        RepoAction::AlreadyBound {
            bindings: repos.len(),
        }
    };

    Ok(VariantReport {
        key: key.clone(),
        os: target.os.clone(),
        app_name: target.app_name.clone(),
        sign_type: target.sign_type.clone(),
        app: if progress.app_created {
            AppAction::Created
        } else {
            AppAction::Existing
        },
        repo,
        final_state: progress.state,
    })
}
