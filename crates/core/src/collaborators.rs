//! Contracts for the remote collaborators the job core depends on.
//!
//! The orchestration layer only talks to these traits. Concrete HTTP
//! implementations live in `scenecast-genai`; in-memory fakes live in
//! `scenecast-pipeline::fakes`.

use async_trait::async_trait;

use crate::credential::Credential;
use crate::generation::GenerationRequest;
use crate::job::OperationHandle;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a call to the operation service or the artifact store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ServiceError {
    /// Structured status code, when the service supplied one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of the credential-selection collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectorError {
    /// The selection mechanism is not available in this environment.
    #[error("Credential selector unavailable: {0}")]
    Unavailable(String),

    /// The user backed out of the selection flow.
    #[error("Credential selection cancelled")]
    Cancelled,

    #[error("Credential selector I/O error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// One status probe of a long-running operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub done: bool,
    /// Location of the produced video, once done.
    pub artifact_uri: Option<String>,
    /// Error reported by the service for a finished operation.
    pub raw_error: Option<String>,
}

impl PollOutcome {
    /// Still running.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Finished and produced a video at `uri`.
    pub fn done_with(uri: impl Into<String>) -> Self {
        Self {
            done: true,
            artifact_uri: Some(uri.into()),
            raw_error: None,
        }
    }

    /// Finished with an error reported by the service.
    pub fn done_with_error(message: impl Into<String>) -> Self {
        Self {
            done: true,
            artifact_uri: None,
            raw_error: Some(message.into()),
        }
    }
}

/// Result of downloading an artifact.
///
/// A non-success transport outcome is reported with `ok == false` and the
/// status text rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchOutcome {
    pub fn success(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            ok: true,
            status: 200,
            status_text: "OK".to_string(),
            bytes,
            content_type,
        }
    }

    pub fn failure(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            status_text: status_text.into(),
            bytes: Vec::new(),
            content_type: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The external mechanism that knows whether a credential is selected and
/// can walk the user through choosing one.
#[async_trait]
pub trait CredentialSelector: Send + Sync {
    async fn has_selection(&self) -> Result<bool, SelectorError>;

    async fn open_selection_flow(&self) -> Result<(), SelectorError>;

    /// The currently selected credential, if any.
    async fn current_credential(&self) -> Result<Option<Credential>, SelectorError>;
}

/// Remote service running long-lived generation operations.
#[async_trait]
pub trait OperationService: Send + Sync {
    async fn submit(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<OperationHandle, ServiceError>;

    async fn poll(
        &self,
        handle: &OperationHandle,
        credential: &Credential,
    ) -> Result<PollOutcome, ServiceError>;
}

/// Remote store serving finished artifacts by URI.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn fetch(&self, uri: &str, credential: &Credential) -> Result<FetchOutcome, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_errors_carry_status() {
        let http = ServiceError::Http {
            status: 404,
            body: "Requested entity was not found.".into(),
        };
        assert_eq!(http.status(), Some(404));
        assert!(http.to_string().contains("Requested entity was not found"));
        assert_eq!(ServiceError::Transport("reset".into()).status(), None);
    }

    #[test]
    fn poll_outcome_constructors() {
        assert!(!PollOutcome::pending().done);
        let done = PollOutcome::done_with("https://x/y");
        assert!(done.done);
        assert_eq!(done.artifact_uri.as_deref(), Some("https://x/y"));
        assert_eq!(
            PollOutcome::done_with_error("blocked").raw_error.as_deref(),
            Some("blocked")
        );
    }

    #[test]
    fn fetch_failure_has_no_bytes() {
        let outcome = FetchOutcome::failure(403, "Forbidden");
        assert!(!outcome.ok);
        assert!(outcome.bytes.is_empty());
    }
}
