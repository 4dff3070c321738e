//! End-to-end pipeline runs against mocked Gmail and Gemini providers

mod common;

use common::{
    create_headers, valid_credential, well_formed_summary, MockAuthorizer,
    MockGenerativeModel, MockMailProvider, MockTokenRefresher,
};
use chrono::Duration;
use gmail_triage::auth::{CredentialBroker, CredentialCache};
use gmail_triage::classifier::{PriorityClassifier, EMPTY_BATCH_SUMMARY, FORMAT_WARNING};
use gmail_triage::config::ModelConfig;
use gmail_triage::error::{ClassificationErrorKind, PersistenceCause, TriageError};
use gmail_triage::fetcher::InboxFetcher;
use gmail_triage::models::SummaryOrigin;
use gmail_triage::pipeline::{Pipeline, RunPhase};
use gmail_triage::store::ArtifactStore;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

/// Broker whose cache holds a credential valid well past the real clock
async fn cached_broker(dir: &Path) -> CredentialBroker {
    let cache = CredentialCache::new(dir.join("token.json"));
    let mut credential = valid_credential();
    credential.expiry = Some(chrono::Utc::now() + Duration::hours(1));
    cache.save(&credential).await.unwrap();

    let mut refresher = MockTokenRefresher::new();
    refresher.expect_refresh().times(0);
    let mut authorizer = MockAuthorizer::new();
    authorizer.expect_authorize().times(0);

    CredentialBroker::new(cache, Box::new(refresher), Box::new(authorizer))
}

/// Inbox with m1..m3 where the lookup of m2 fails
fn inbox_with_one_failure() -> MockMailProvider {
    let mut provider = MockMailProvider::new();
    provider
        .expect_list_message_ids()
        .withf(|_, label, max_results| label == "INBOX" && *max_results == 20)
        .times(1)
        .returning(|_, _, _| Ok(vec!["m1".to_string(), "m2".to_string(), "m3".to_string()]));
    provider
        .expect_get_message_headers()
        .withf(|_, id| id == "m1")
        .returning(|_, _| Ok(create_headers("Server outage", "ops@example.com")));
    provider
        .expect_get_message_headers()
        .withf(|_, id| id == "m2")
        .returning(|_, id| Err(TriageError::MessageNotFound(id.to_string())));
    provider
        .expect_get_message_headers()
        .withf(|_, id| id == "m3")
        .returning(|_, _| Ok(create_headers("Weekly newsletter", "news@example.com")));
    provider
}

fn pipeline(
    broker: CredentialBroker,
    provider: MockMailProvider,
    model: MockGenerativeModel,
    store_dir: &Path,
    model_config: ModelConfig,
) -> Pipeline {
    Pipeline::new(
        broker,
        InboxFetcher::new(Arc::new(provider), "INBOX", 4),
        PriorityClassifier::new(Arc::new(model)),
        ArtifactStore::new(store_dir),
        model_config,
        20,
    )
}

fn model_config() -> ModelConfig {
    ModelConfig::default().with_api_key("test-key")
}

async fn saved_files(dir: &TempDir) -> usize {
    ArtifactStore::new(dir.path().join("summaries"))
        .list()
        .await
        .unwrap()
        .len()
}

#[test]
fn test_well_formed_summary_fixture() {
    let summary = well_formed_summary(&[("Outage", "ops@example.com")], &[]);
    assert!(summary.contains("High Priority:\n• Outage - From: ops@example.com"));
    assert!(summary.ends_with("Low Priority:\nNone"));
}

#[tokio::test]
async fn test_end_to_end_with_one_failed_lookup() {
    let dir = tempdir().unwrap();
    let response = well_formed_summary(
        &[("Server outage", "ops@example.com")],
        &[("Weekly newsletter", "news@example.com")],
    );
    let expected = response.clone();

    let mut model = MockGenerativeModel::new();
    model
        .expect_generate()
        .withf(|api_key, model, prompt| {
            api_key == "test-key"
                && model == "gemini-2.5-flash"
                && prompt.contains("Analyze these 2 emails")
                && prompt.contains("1. Subject: Server outage\n   From: ops@example.com")
                && prompt.contains("2. Subject: Weekly newsletter\n   From: news@example.com")
        })
        .times(1)
        .returning(move |_, _, _| Ok(response.clone()));

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.email_count, 2);
    assert_eq!(report.skipped_count, 1);
    assert!(report.well_formed);
    assert_eq!(report.origin, SummaryOrigin::Model);
    assert_eq!(report.summary, expected);
    assert!(!report.run_id.is_empty());

    let artifact = report.artifact.expect("summary should be saved");
    assert_eq!(tokio::fs::read_to_string(&artifact.path).await.unwrap(), expected);
    assert_eq!(saved_files(&dir).await, 1);
}

#[tokio::test]
async fn test_listing_failure_stops_run() {
    let dir = tempdir().unwrap();

    let mut provider = MockMailProvider::new();
    provider
        .expect_list_message_ids()
        .returning(|_, _, _| Err(TriageError::RateLimitExceeded("HTTP 429".to_string())));
    provider.expect_get_message_headers().times(0);

    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(0);

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        provider,
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    let result = pipeline.run().await;
    assert!(matches!(result, Err(TriageError::FetchError(_))));
    assert_eq!(saved_files(&dir).await, 0);
}

#[tokio::test]
async fn test_missing_api_key_stops_before_model_call() {
    let dir = tempdir().unwrap();

    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(0);

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        ModelConfig::default(),
    );

    let result = pipeline.run().await;
    assert!(matches!(result, Err(TriageError::ConfigError(_))));
    assert_eq!(saved_files(&dir).await, 0);
}

#[tokio::test]
async fn test_model_failure_carries_kind() {
    let dir = tempdir().unwrap();

    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(1).returning(|_, _, _| {
        Err(TriageError::ClassificationError {
            kind: ClassificationErrorKind::Auth,
            message: "API key not valid".to_string(),
        })
    });

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    match pipeline.run().await {
        Err(TriageError::ClassificationError { kind, .. }) => {
            assert_eq!(kind, ClassificationErrorKind::Auth)
        }
        other => panic!("expected ClassificationError, got {:?}", other.map(|r| r.summary)),
    }
    assert_eq!(saved_files(&dir).await, 0);
}

#[tokio::test]
async fn test_malformed_response_is_saved_with_warning() {
    let dir = tempdir().unwrap();

    let mut model = MockGenerativeModel::new();
    model
        .expect_generate()
        .returning(|_, _, _| Ok("Everything looks fine.".to_string()));

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert!(!report.well_formed);
    assert_eq!(report.summary, format!("{}Everything looks fine.", FORMAT_WARNING));
    assert!(report.artifact.is_some());
}

#[tokio::test]
async fn test_empty_model_response_saves_fallback() {
    let dir = tempdir().unwrap();

    let mut model = MockGenerativeModel::new();
    model.expect_generate().returning(|_, _, _| Ok(String::new()));

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.origin, SummaryOrigin::Fallback);
    let bullets = report.summary.lines().filter(|l| l.starts_with("• ")).count();
    assert_eq!(bullets, 2);
    assert!(report.summary.starts_with("Email Summary (AI processing unavailable)"));
    assert!(report.artifact.is_some());
}

#[tokio::test]
async fn test_empty_inbox_saves_nothing() {
    let dir = tempdir().unwrap();

    let mut provider = MockMailProvider::new();
    provider
        .expect_list_message_ids()
        .returning(|_, _, _| Ok(vec![]));
    provider.expect_get_message_headers().times(0);

    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(0);

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        provider,
        model,
        &dir.path().join("summaries"),
        model_config(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.summary, EMPTY_BATCH_SUMMARY);
    assert_eq!(report.origin, SummaryOrigin::EmptyBatch);
    assert_eq!(report.email_count, 0);
    assert!(report.artifact.is_none());
    assert_eq!(saved_files(&dir).await, 0);
}

#[tokio::test]
async fn test_authorization_failure_stops_run() {
    let dir = tempdir().unwrap();

    let mut refresher = MockTokenRefresher::new();
    refresher.expect_refresh().times(0);
    let mut authorizer = MockAuthorizer::new();
    authorizer
        .expect_authorize()
        .returning(|| Err(TriageError::AuthError("credentials.json not found".to_string())));
    let broker = CredentialBroker::new(
        CredentialCache::new(dir.path().join("token.json")),
        Box::new(refresher),
        Box::new(authorizer),
    );

    let mut provider = MockMailProvider::new();
    provider.expect_list_message_ids().times(0);
    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(0);

    let pipeline = pipeline(broker, provider, model, &dir.path().join("summaries"), model_config());

    assert!(matches!(pipeline.run().await, Err(TriageError::AuthError(_))));
}

#[tokio::test]
async fn test_save_failure_is_persistence_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    tokio::fs::write(&blocker, "file").await.unwrap();

    let mut model = MockGenerativeModel::new();
    model
        .expect_generate()
        .returning(|_, _, _| Ok(well_formed_summary(&[], &[])));

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &blocker.join("summaries"),
        model_config(),
    );

    match pipeline.run().await {
        Err(TriageError::PersistenceError { cause, .. }) => {
            assert_eq!(cause, PersistenceCause::Directory)
        }
        other => panic!("expected PersistenceError, got {:?}", other.map(|r| r.summary)),
    }
}

#[tokio::test]
async fn test_phase_callback_sees_each_phase() {
    let dir = tempdir().unwrap();

    let mut model = MockGenerativeModel::new();
    model
        .expect_generate()
        .returning(|_, _, _| Ok(well_formed_summary(&[], &[])));

    let phases = Arc::new(Mutex::new(Vec::new()));
    let recorded = phases.clone();

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        inbox_with_one_failure(),
        model,
        &dir.path().join("summaries"),
        model_config(),
    )
    .with_phase_callback(Arc::new(move |phase: RunPhase| recorded.lock().unwrap().push(phase)));

    pipeline.run().await.unwrap();

    assert_eq!(
        *phases.lock().unwrap(),
        vec![
            RunPhase::Authenticating,
            RunPhase::Fetching,
            RunPhase::Classifying,
            RunPhase::Saving
        ]
    );
}

#[tokio::test]
async fn test_limit_is_passed_to_listing() {
    let dir = tempdir().unwrap();

    let mut provider = MockMailProvider::new();
    provider
        .expect_list_message_ids()
        .withf(|_, _, max_results| *max_results == 5)
        .times(1)
        .returning(|_, _, _| Ok(vec![]));

    let mut model = MockGenerativeModel::new();
    model.expect_generate().times(0);

    let pipeline = pipeline(
        cached_broker(dir.path()).await,
        provider,
        model,
        &dir.path().join("summaries"),
        model_config(),
    )
    .with_limit(5);

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.email_count, 0);
}
