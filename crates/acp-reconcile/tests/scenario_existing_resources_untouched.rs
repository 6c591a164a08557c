use std::sync::Arc;

use acp_reconcile::{AppAction, ReconcileOptions, Reconciler, RepoAction};
use acp_testkit::{ApiCall, CallKind, ConfigFixture, FakeAppCenter};

#[tokio::test]
async fn existing_app_with_binding_is_left_alone() {
    // Bound to a different URL than configured; bindings are never compared.
    let fake = FakeAppCenter::new("acme", "acme")
        .with_app("App1-prod")
        .with_repo("App1-prod", "https://example.com/old.git");
    let cfg = ConfigFixture::new("acme")
        .platform("iOS", &["prod"])
        .app("iOS", "App1", "https://example.com/app1.git")
        .build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    assert_eq!(fake.mutation_count(), 0);
    assert!(report.is_noop());
    assert_eq!(fake.repos_for("App1-prod")[0].repo_url, "https://example.com/old.git");
}

#[tokio::test]
async fn existing_app_without_binding_only_gets_bound() {
    let fake = FakeAppCenter::new("acme", "acme").with_app("App1-prod");
    let cfg = ConfigFixture::new("acme")
        .platform("iOS", &["prod"])
        .app("iOS", "App1", "https://example.com/app1.git")
        .build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    assert_eq!(fake.create_app_count(), 0);
    assert_eq!(fake.create_repo_count(), 1);
    assert_eq!(report.variants[0].app, AppAction::Existing);
    assert_eq!(
        report.variants[0].repo,
        RepoAction::Bound {
            repo_url: "https://example.com/app1.git".to_string()
        }
    );
}

#[tokio::test]
async fn unrelated_apps_are_ignored() {
    let fake = FakeAppCenter::new("acme", "acme")
        .with_app("Legacy-prod")
        .with_app("app1-prod");
    let cfg = ConfigFixture::new("acme")
        .platform("iOS", &["prod"])
        .app("iOS", "App1", "https://example.com/app1.git")
        .build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    // Name matching is exact, so the lowercase look-alike does not count.
    assert_eq!(fake.create_app_count(), 1);
    assert_eq!(report.existing_apps, 2);
    let touched: Vec<String> = fake
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ApiCall::GetRepoConfigs { app, .. } => Some(app),
            _ => None,
        })
        .collect();
    assert_eq!(touched, vec!["App1-prod"]);
    assert_eq!(fake.count(CallKind::GetOrgApps), 1);
}

#[tokio::test]
async fn repeated_application_is_created_once() {
    let fake = FakeAppCenter::new("acme", "acme");
    let cfg = ConfigFixture::new("acme")
        .platform("iOS", &["prod"])
        .app("iOS", "App1", "https://example.com/app1.git")
        .app("iOS", "App1", "https://example.com/app1.git")
        .build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    assert_eq!(fake.create_app_count(), 1);
    assert_eq!(fake.create_repo_count(), 1);
    assert_eq!(report.variants.len(), 2);
    assert_eq!(report.variants[1].app, AppAction::Existing);
    assert_eq!(report.variants[1].repo, RepoAction::AlreadyBound { bindings: 1 });
}

#[tokio::test]
async fn colliding_composite_keys_share_one_app() {
    // "A" + "b-c" and "A-b" + "c" both name "A-b-c".
    let fake = FakeAppCenter::new("acme", "acme");
    let cfg = ConfigFixture::new("acme")
        .platform("iOS", &[])
        .app_with_sign_types("iOS", "A", "https://example.com/a.git", &["b-c"])
        .app_with_sign_types("iOS", "A-b", "https://example.com/ab.git", &["c"])
        .build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    assert_eq!(fake.app_names(), vec!["A-b-c"]);
    assert_eq!(fake.create_app_count(), 1);
    assert_eq!(report.indexed_apps, vec!["A-b-c"]);
}

#[tokio::test]
async fn empty_desired_tree_only_reads() {
    let fake = FakeAppCenter::new("acme", "acme").with_app("Other-prod");
    let cfg = ConfigFixture::new("acme").platform("iOS", &["prod"]).build();

    let report = Reconciler::new(Arc::new(fake.clone()), ReconcileOptions::default())
        .run(&cfg)
        .await
        .unwrap();

    assert!(report.variants.is_empty());
    assert_eq!(fake.calls().len(), 2);
}
