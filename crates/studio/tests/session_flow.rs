//! Session-level flows with in-memory collaborators: credential gating,
//! generation, and saving the artifact.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use scenecast_core::collaborators::{PollOutcome, SelectorError, ServiceError};
use scenecast_core::credential::CredentialState;
use scenecast_core::failure::FailureKind;
use scenecast_core::generation::GenerationRequest;
use scenecast_pipeline::config::PollConfig;
use scenecast_pipeline::fakes::{FakeSelector, MemoryArtifactStore, ScriptedOperationService};
use scenecast_pipeline::gate::GateError;
use scenecast_studio::session::{save_artifact, Studio, StudioError};

fn fast_poll() -> PollConfig {
    PollConfig::default().with_interval(Duration::from_millis(5))
}

fn studio(
    selector: FakeSelector,
) -> (Studio, Arc<FakeSelector>, Arc<ScriptedOperationService>, Arc<MemoryArtifactStore>) {
    let selector = Arc::new(selector);
    let operations = Arc::new(ScriptedOperationService::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let studio = Studio::new(
        selector.clone(),
        operations.clone(),
        artifacts.clone(),
        fast_poll(),
    );
    (studio, selector, operations, artifacts)
}

// ---------------------------------------------------------------------------
// Test: credential gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn existing_key_skips_selection_flow() {
    let (studio, selector, _, _) = studio(FakeSelector::with_key("k"));

    studio.ensure_credential().await.unwrap();

    assert_eq!(studio.gate().state(), CredentialState::Selected);
    assert_eq!(selector.open_calls(), 0);
}

#[tokio::test]
async fn missing_key_runs_selection_flow() {
    let (studio, selector, _, _) = studio(FakeSelector::empty_then("k"));

    studio.ensure_credential().await.unwrap();

    assert_eq!(studio.gate().state(), CredentialState::Selected);
    assert_eq!(selector.open_calls(), 1);
}

#[tokio::test]
async fn cancelled_selection_is_an_error() {
    let (studio, _, _, _) =
        studio(FakeSelector::empty_then("k").fail_open(SelectorError::Cancelled));

    let result = studio.ensure_credential().await;

    assert_matches!(
        result,
        Err(StudioError::Credential(GateError::Selection(SelectorError::Cancelled)))
    );
    assert_eq!(studio.gate().state(), CredentialState::Unselected);
}

// ---------------------------------------------------------------------------
// Test: generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_returns_downloaded_artifact() {
    let (studio, _, operations, artifacts) = studio(FakeSelector::with_key("k"));
    operations.script_polls(
        &ScriptedOperationService::handle_name(1),
        [Ok(PollOutcome::pending()), Ok(PollOutcome::done_with("https://files/v1"))],
    );
    artifacts.insert("https://files/v1", b"fake-mp4".to_vec());
    studio.ensure_credential().await.unwrap();

    let artifact = studio
        .generate(GenerationRequest::new("a cat"))
        .await
        .expect("generation should succeed");

    assert_eq!(artifact.bytes(), b"fake-mp4");
    assert_eq!(artifact.content_type(), "video/mp4");
}

#[tokio::test]
async fn generate_surfaces_credential_failure() {
    let (studio, _, operations, _) = studio(FakeSelector::with_key("k"));
    operations.fail_next_submit(ServiceError::Http {
        status: 404,
        body: "Requested entity was not found.".into(),
    });
    studio.ensure_credential().await.unwrap();

    let result = studio.generate(GenerationRequest::new("a cat")).await;

    assert_matches!(
        result,
        Err(StudioError::Generation(ref failure)) if failure.kind == FailureKind::CredentialInvalid
    );
    assert_eq!(studio.gate().state(), CredentialState::Unselected);
}

#[tokio::test]
async fn generate_without_credential_is_rejected() {
    let (studio, _, operations, _) = studio(FakeSelector::with_key("k"));

    let result = studio.generate(GenerationRequest::new("a cat")).await;

    assert_matches!(result, Err(StudioError::Submit(_)));
    assert!(operations.submitted().is_empty());
}

// ---------------------------------------------------------------------------
// Test: saving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn artifact_is_written_with_default_name() {
    let (studio, _, operations, artifacts) = studio(FakeSelector::with_key("k"));
    operations.script_polls(
        &ScriptedOperationService::handle_name(1),
        [Ok(PollOutcome::done_with("https://files/v1"))],
    );
    artifacts.insert("https://files/v1", vec![7; 32]);
    studio.ensure_credential().await.unwrap();
    let artifact = studio.generate(GenerationRequest::new("a cat")).await.unwrap();

    let dir = std::env::temp_dir().join(format!("scenecast-test-{}", artifact.id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let path = save_artifact(&artifact, None, &dir).await.unwrap();

    assert_eq!(path, dir.join(format!("scenecast-{}.mp4", artifact.id())));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![7; 32]);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
