//! Teardown removes what the suite created, tolerating what it cannot

mod common;

use perkharness_common::TestCredentials;
use perkharness_e2e::reaper;
use perkharness_e2e::{SuiteContext, UserDirectory};

use common::{perk, spawn_backend, unique};

#[tokio::test]
async fn teardown_removes_perks_and_user() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    let email = suite.credentials.normalized_email();

    suite.create_perk(&perk(unique("Doomed"))).await.unwrap();
    assert_eq!(backend.users().perk_count(), 2);
    assert!(backend.users().has_user(&email));

    let report = suite.teardown(backend.users()).await;

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.attempted, 3);
    assert_eq!(backend.users().perk_count(), 0);
    assert!(!backend.users().has_user(&email));
}

#[tokio::test]
async fn failing_deletion_does_not_stop_the_rest() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;

    let ids = vec![
        suite.seeded_perk.id.clone(),
        "already-gone".to_string(),
    ];
    let report = reaper::cleanup(suite.api(), ids, &suite.credentials, backend.users()).await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item, "already-gone");
    assert_eq!(backend.users().perk_count(), 0);
    assert_eq!(backend.users().user_count(), 0);
}

#[tokio::test]
async fn email_can_only_be_registered_again_after_teardown() {
    let backend = spawn_backend().await;
    let credentials = TestCredentials::generate("UI Test User");

    let suite = SuiteContext::setup_with(&backend.env, credentials.clone(), backend.users())
        .await
        .unwrap();

    let duplicate = SuiteContext::setup_with(&backend.env, credentials.clone(), backend.users())
        .await
        .unwrap_err();
    assert!(duplicate.to_string().contains("User already exists"), "{duplicate}");

    suite.teardown(backend.users()).await;

    let again = SuiteContext::setup_with(&backend.env, credentials, backend.users())
        .await
        .unwrap();
    again.teardown(backend.users()).await;
}

#[tokio::test]
async fn teardown_runs_when_the_body_panics() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    let users = backend.users().clone();

    let outcome = tokio::spawn(async move {
        suite
            .run(&users, |_| async {
                panic!("assertion inside the suite body");
            })
            .await
    })
    .await;

    assert!(outcome.unwrap_err().is_panic());
    assert_eq!(backend.users().perk_count(), 0);
    assert_eq!(backend.users().user_count(), 0);
}

#[tokio::test]
async fn storage_is_cleared_after_teardown() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    let app = suite.app.clone();

    assert_eq!(app.storage().token(), Some(suite.session.token.clone()));
    assert_eq!(app.api().bearer_token(), Some(suite.session.token.clone()));

    suite.teardown(backend.users()).await;

    assert!(app.storage().is_empty());
    assert_eq!(app.api().bearer_token(), None);
}

#[tokio::test]
async fn missing_user_counts_as_removed() {
    let backend = spawn_backend().await;
    let removed = backend
        .users()
        .remove_user_by_email("nobody@example.com")
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let report = reaper::cleanup(
        &perkharness_common::ApiClient::new(backend.server.api_base_url()).unwrap(),
        Vec::new(),
        &TestCredentials::generate("Ghost"),
        backend.users(),
    )
    .await;
    assert!(report.is_clean());
    assert_eq!(report.attempted, 1);
}

#[tokio::test]
async fn teardown_through_a_clone_leaves_nothing_for_a_second_pass() {
    let backend = spawn_backend().await;
    let suite = backend.suite().await;
    suite.create_perk(&perk(unique("Cloned"))).await.unwrap();

    let first = suite.clone().teardown(backend.users()).await;
    assert!(first.is_clean());
    assert_eq!(first.attempted, 3);

    let second = suite.teardown(backend.users()).await;
    assert!(second.is_clean(), "{:?}", second.failures);
    assert_eq!(second.attempted, 1);
    assert_eq!(backend.users().perk_count(), 0);
    assert_eq!(backend.users().user_count(), 0);
}
