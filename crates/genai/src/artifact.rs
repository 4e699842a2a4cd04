//! Artifact download over HTTP.

use async_trait::async_trait;
use scenecast_core::collaborators::{ArtifactStore, FetchOutcome, ServiceError};
use scenecast_core::credential::Credential;

/// Query parameter the file service expects the API key in.
pub const KEY_QUERY_PARAM: &str = "key";

/// Downloads generated videos by URI, authenticating with the API key as
/// a query parameter.
pub struct HttpArtifactStore {
    client: reqwest::Client,
}

impl HttpArtifactStore {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn fetch(&self, uri: &str, credential: &Credential) -> Result<FetchOutcome, ServiceError> {
        let response = self
            .client
            .get(uri)
            .query(&[(KEY_QUERY_PARAM, credential.expose())])
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string());
            tracing::debug!(status = status.as_u16(), "Artifact download rejected");
            return Ok(FetchOutcome::failure(status.as_u16(), status_text));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        tracing::debug!(size_bytes = bytes.len(), "Artifact downloaded");
        Ok(FetchOutcome::success(bytes.to_vec(), content_type))
    }
}
