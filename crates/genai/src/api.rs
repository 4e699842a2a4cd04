//! REST client for the long-running video generation endpoints.
//!
//! Wraps `models/{model}:predictLongRunning` (submission) and
//! `GET {operation}` (status) using [`reqwest`], and implements
//! [`OperationService`] on top of them.

use async_trait::async_trait;
use scenecast_core::collaborators::{OperationService, PollOutcome, ServiceError};
use scenecast_core::credential::Credential;
use scenecast_core::generation::GenerationRequest;
use scenecast_core::job::OperationHandle;

use crate::messages::{Operation, PredictRequest};
use crate::API_KEY_HEADER;

/// HTTP client for one model on the generative-language API.
pub struct GenAiApi {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

/// Errors from the REST layer, before they are mapped onto
/// [`ServiceError`].
#[derive(Debug, thiserror::Error)]
pub enum GenAiApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Raw response body; error texts such as "Requested entity was
        /// not found." live here.
        body: String,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<GenAiApiError> for ServiceError {
    fn from(err: GenAiApiError) -> Self {
        match err {
            GenAiApiError::Request(e) => ServiceError::Transport(e.to_string()),
            GenAiApiError::ApiError { status, body } => ServiceError::Http { status, body },
            GenAiApiError::Decode(msg) => ServiceError::Protocol(msg),
        }
    }
}

impl GenAiApi {
    /// * `api_base` - REST base, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    /// * `model` - model id, e.g. `veo-3.1-fast-generate-preview`.
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `POST {base}/models/{model}:predictLongRunning`.
    pub fn submit_url(&self) -> String {
        format!("{}/models/{}:predictLongRunning", self.api_base, self.model)
    }

    /// `GET {base}/{operation_name}`.
    pub fn operation_url(&self, operation_name: &str) -> String {
        format!("{}/{}", self.api_base, operation_name.trim_start_matches('/'))
    }

    /// Start a video generation and return the operation resource.
    pub async fn predict_long_running(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<Operation, GenAiApiError> {
        let response = self
            .client
            .post(self.submit_url())
            .header(API_KEY_HEADER, credential.expose())
            .json(&PredictRequest::from(request))
            .send()
            .await?;

        let operation: Operation = Self::parse_response(response).await?;
        if operation.name.is_empty() {
            return Err(GenAiApiError::Decode(
                "operation resource has no name".to_string(),
            ));
        }
        Ok(operation)
    }

    /// Fetch the current state of an operation.
    pub async fn get_operation(
        &self,
        operation_name: &str,
        credential: &Credential,
    ) -> Result<Operation, GenAiApiError> {
        let response = self
            .client
            .get(self.operation_url(operation_name))
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on a 2xx status, or an
    /// [`GenAiApiError::ApiError`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenAiApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenAiApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenAiApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GenAiApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl OperationService for GenAiApi {
    async fn submit(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<OperationHandle, ServiceError> {
        let operation = self.predict_long_running(request, credential).await?;
        tracing::debug!(model = %self.model, operation = %operation.name, "Video generation accepted");
        Ok(OperationHandle::new(operation.name))
    }

    async fn poll(
        &self,
        handle: &OperationHandle,
        credential: &Credential,
    ) -> Result<PollOutcome, ServiceError> {
        let operation = self.get_operation(handle.as_str(), credential).await?;
        if operation.done
            && operation.artifact_uri().is_none()
            && !operation.filtered_reasons().is_empty()
        {
            tracing::warn!(
                operation = %operation.name,
                reasons = ?operation.filtered_reasons(),
                "Operation finished with filtered samples",
            );
        }
        Ok(operation.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn api(base: &str) -> GenAiApi {
        GenAiApi::new(reqwest::Client::new(), base, "veo-3.1-fast-generate-preview")
    }

    // -- urls --

    #[test]
    fn submit_url_targets_model_method() {
        assert_eq!(
            api("https://generativelanguage.googleapis.com/v1beta/").submit_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/veo-3.1-fast-generate-preview:predictLongRunning"
        );
    }

    #[test]
    fn operation_url_joins_operation_name() {
        let api = api("http://localhost:9000/v1beta");
        assert_eq!(
            api.operation_url("models/veo/operations/abc"),
            "http://localhost:9000/v1beta/models/veo/operations/abc"
        );
        assert_eq!(
            api.operation_url("/operations/abc"),
            "http://localhost:9000/v1beta/operations/abc"
        );
    }

    // -- error mapping --

    #[test]
    fn api_error_keeps_status_and_body() {
        let err = ServiceError::from(GenAiApiError::ApiError {
            status: 404,
            body: "Requested entity was not found.".into(),
        });
        assert_matches!(err, ServiceError::Http { status: 404, ref body } if body.contains("entity was not found"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn decode_error_is_protocol_error() {
        let err = ServiceError::from(GenAiApiError::Decode("missing field".into()));
        assert_matches!(err, ServiceError::Protocol(_));
        assert_eq!(err.status(), None);
    }
}
