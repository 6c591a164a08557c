//! `acp reconcile` and `acp plan`.

use std::sync::Arc;
use std::time::Duration;

use acp_reconcile::{
    AppAction, ReconcileOptions, ReconcilePlan, ReconcileReport, Reconciler, RepoAction,
};
use anyhow::{bail, Context, Result};
use tracing::{error, info, Instrument};
use uuid::Uuid;

use super::{build_client, load_config, ClientArgs};

pub async fn run_reconcile(
    config_paths: Vec<String>,
    concurrency: usize,
    deadline_secs: Option<u64>,
    json: bool,
    client: ClientArgs,
) -> Result<()> {
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    let (loaded, config) = load_config(&config_paths)?;
    let api = build_client(&config, &client)?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("reconcile", %run_id);

    let reconciler = Reconciler::new(
        Arc::new(api),
        ReconcileOptions {
            concurrency,
            run_deadline: deadline_secs.map(Duration::from_secs),
        },
    );

    let outcome = async {
        info!(
            organization = %config.organization,
            env = %config.api.env,
            host = %config.api.host,
            config_hash = %loaded.config_hash,
            "starting"
        );
        reconciler.run(&config).await
    }
    .instrument(span.clone())
    .await;

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            span.in_scope(|| error!(kind = ?e.kind(), error = %e, "aborted"));
            bail!("aborted: {e}");
        }
    };
    span.in_scope(|| {
        info!(
            apps_created = report.apps_created(),
            repos_created = report.repos_created(),
            "complete"
        )
    });

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        );
    } else {
        print_report(&run_id, &report);
    }
    Ok(())
}

pub async fn run_plan(config_paths: Vec<String>, json: bool, client: ClientArgs) -> Result<()> {
    let (_, config) = load_config(&config_paths)?;
    let api = build_client(&config, &client)?;
    let plan = Reconciler::new(Arc::new(api), ReconcileOptions::default())
        .plan(&config)
        .await
        .map_err(|e| anyhow::anyhow!("plan failed: {e}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("serialize plan")?
        );
    } else {
        print_plan(&plan);
    }
    Ok(())
}

fn print_report(run_id: &Uuid, report: &ReconcileReport) {
    println!("run_id={run_id}");
    println!("user={}", report.user);
    for v in &report.variants {
        let app = match v.app {
            AppAction::Existing => "existing",
            AppAction::Created => "created",
        };
        let repo = match &v.repo {
            RepoAction::AlreadyBound { .. } => "already_bound",
            RepoAction::Bound { .. } => "bound",
        };
        println!("variant={} app={app} repo={repo}", v.key);
    }
    println!(
        "result=complete apps_created={} repos_created={}",
        report.apps_created(),
        report.repos_created()
    );
}

fn print_plan(plan: &ReconcilePlan) {
    println!("user={}", plan.user);
    println!("existing_apps={}", plan.existing_apps);
    for v in &plan.variants {
        println!(
            "variant={} create_app={} bind_repo={}",
            v.key, v.create_app, v.bind_repo
        );
    }
    println!("planned_creations={}", plan.creations());
}
