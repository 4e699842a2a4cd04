//! One interactive generation session: credential gating, submission,
//! progress reporting, and the final artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scenecast_core::artifact::LocalArtifact;
use scenecast_core::collaborators::{ArtifactStore, CredentialSelector, OperationService};
use scenecast_core::credential::CredentialState;
use scenecast_core::failure::{FailureInfo, FailureKind};
use scenecast_core::generation::GenerationRequest;
use scenecast_core::job::JobStatus;
use scenecast_core::types::Generation;
use scenecast_genai::api::GenAiApi;
use scenecast_genai::artifact::HttpArtifactStore;
use scenecast_genai::http_client;
use scenecast_genai::selector::EnvKeySelector;
use scenecast_pipeline::config::PollConfig;
use scenecast_pipeline::controller::{GenerationJobController, SubmitError};
use scenecast_pipeline::events::GenerationEvent;
use scenecast_pipeline::gate::{CredentialGate, GateError};
use tokio::sync::broadcast;

use crate::config::StudioConfig;

/// Billing notice shown before asking for a key.
pub const BILLING_NOTICE: &str = "Video generation requires an API key from a project with \
    billing enabled. See https://ai.google.dev/gemini-api/docs/billing";

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Credential(#[from] GateError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The job ended in `Failed`.
    #[error("{}", .0.message)]
    Generation(FailureInfo),

    /// Another submission took the controller's slot.
    #[error("Generation was superseded by a newer request")]
    Superseded,

    #[error("Failed to write video: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Studio {
    gate: Arc<CredentialGate>,
    controller: GenerationJobController,
}

impl Studio {
    pub fn new(
        selector: Arc<dyn CredentialSelector>,
        operations: Arc<dyn OperationService>,
        artifacts: Arc<dyn ArtifactStore>,
        poll: PollConfig,
    ) -> Self {
        let gate = Arc::new(CredentialGate::new(selector));
        let controller = GenerationJobController::new(gate.clone(), operations, artifacts, poll);
        Self { gate, controller }
    }

    /// Wire the HTTP collaborators described by `config`.
    pub fn from_config(config: &StudioConfig) -> Result<Self, StudioError> {
        let client = http_client(config.http_timeout)?;
        let api = GenAiApi::new(client.clone(), config.api_base.as_str(), config.model.as_str());
        Ok(Self::new(
            Arc::new(EnvKeySelector::new(config.api_key_var.as_str())),
            Arc::new(api),
            Arc::new(HttpArtifactStore::new(client)),
            config.poll_config(),
        ))
    }

    pub fn gate(&self) -> &Arc<CredentialGate> {
        &self.gate
    }

    pub fn controller(&self) -> &GenerationJobController {
        &self.controller
    }

    /// Make sure a credential is selected, running the selection flow once
    /// if the initial check finds none.
    pub async fn ensure_credential(&self) -> Result<(), StudioError> {
        if self.gate.state() != CredentialState::Selected
            && self.gate.check_initial().await != CredentialState::Selected
        {
            eprintln!("{BILLING_NOTICE}");
            self.gate.request_selection().await?;
        }
        Ok(())
    }

    /// Submit `request` and wait for its artifact.
    ///
    /// Progress is logged while the job runs.
    pub async fn generate(&self, request: GenerationRequest) -> Result<LocalArtifact, StudioError> {
        let events = self.controller.subscribe();
        let ticket = self.controller.submit(request)?;
        let progress = tokio::spawn(report_progress(events, ticket.generation));

        let settled = self.controller.wait_until_settled(ticket).await;
        progress.abort();

        let job = settled.ok_or(StudioError::Superseded)?;
        match (job.status, job.artifact, job.failure) {
            (JobStatus::Ready, Some(artifact), _) => Ok(artifact),
            (_, _, Some(failure)) => Err(StudioError::Generation(failure)),
            (status, _, None) => Err(StudioError::Generation(FailureInfo::new(
                FailureKind::Unknown,
                format!("job settled as {status} without a result"),
            ))),
        }
    }

    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
    }
}

/// Write the artifact to `output`, or to `scenecast-<id>.<ext>` in `dir`.
pub async fn save_artifact(
    artifact: &LocalArtifact,
    output: Option<&Path>,
    dir: &Path,
) -> Result<PathBuf, StudioError> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => dir.join(format!(
            "scenecast-{}.{}",
            artifact.id(),
            artifact.file_extension()
        )),
    };
    tokio::fs::write(&path, artifact.bytes()).await?;
    tracing::info!(path = %path.display(), size_bytes = artifact.size_bytes(), "Video saved");
    Ok(path)
}

async fn report_progress(mut events: broadcast::Receiver<GenerationEvent>, generation: Generation) {
    loop {
        let event = match events.recv().await {
            Ok(event) if event.generation() == generation => event,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            GenerationEvent::Submitted { operation, .. } => {
                tracing::info!(operation = %operation, "Generating your video");
            }
            GenerationEvent::PollTick { attempt, done: false, .. } => {
                tracing::info!(attempt, "Still rendering, this can take a few minutes");
            }
            GenerationEvent::Resolved { .. } => tracing::info!("Downloading video"),
            GenerationEvent::Ready { .. }
            | GenerationEvent::Failed { .. }
            | GenerationEvent::Superseded { .. } => break,
            GenerationEvent::PollTick { .. } => {}
        }
    }
}
