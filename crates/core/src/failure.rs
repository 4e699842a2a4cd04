//! Failure taxonomy and classification of collaborator errors.
//!
//! Every remote-call failure (submission, polling, download) is turned
//! into a [`FailureInfo`] by [`classify`]. The text-matching rule for
//! credential problems lives only in [`is_credential_failure`] so it can
//! be tightened without touching the job state machine.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Messages that mean the credential (or the entity it refers to) is not
/// usable. Matched case-insensitively.
const CREDENTIAL_FAILURE_PATTERN: &str =
    r"(?i)(entity was not found|unauthori[sz]ed|api key not valid|permission[ _]denied)";

/// HTTP statuses that always mean the credential was rejected.
pub const CREDENTIAL_FAILURE_STATUSES: &[u16] = &[401, 403];

/// Shown when a credential failure forces re-selection.
pub const MSG_CREDENTIAL_INVALID: &str =
    "Your API key is invalid or not found. Please select a new key.";
/// Prefix for polling transport failures.
pub const MSG_POLL_FAILED: &str = "Failed to get video generation status.";
/// Shown when the operation finished without producing a video.
pub const MSG_ARTIFACT_MISSING: &str = "operation completed but no artifact was produced";
/// Shown when the polling ceiling is exceeded.
pub const MSG_POLL_TIMEOUT: &str = "timed out waiting for the video generation operation";
/// Shown when the credential is dropped while a job is running.
pub const MSG_CREDENTIAL_REVOKED: &str = "credential was invalidated while the job was in flight";
/// Shown when the controller shuts down with a job in flight.
pub const MSG_JOB_STOPPED: &str = "generation was stopped before it finished";

static CREDENTIAL_FAILURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CREDENTIAL_FAILURE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CredentialInvalid,
    OperationFailed,
    ArtifactMissing,
    DownloadFailed,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::CredentialInvalid => "credential_invalid",
            FailureKind::OperationFailed => "operation_failed",
            FailureKind::ArtifactMissing => "artifact_missing",
            FailureKind::DownloadFailed => "download_failed",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Guidance a presentation layer can show next to the message.
    pub fn guidance(&self) -> &'static str {
        match self {
            FailureKind::CredentialInvalid => "Select a new API key to continue.",
            FailureKind::OperationFailed => "Adjust the prompt or try again.",
            FailureKind::ArtifactMissing => "The service produced no video; try a different prompt.",
            FailureKind::DownloadFailed => "The video could not be downloaded; try again.",
            FailureKind::Unknown => "Try again.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureStage
// ---------------------------------------------------------------------------

/// Where in the job lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Submit,
    /// The status request itself failed.
    Poll,
    /// The service reported the operation as done with an error.
    Operation,
    Resolve,
    Download,
    Internal,
}

impl FailureStage {
    /// The kind used when the failure is not a credential problem.
    pub fn default_kind(&self) -> FailureKind {
        match self {
            FailureStage::Submit | FailureStage::Poll | FailureStage::Operation => {
                FailureKind::OperationFailed
            }
            FailureStage::Resolve => FailureKind::ArtifactMissing,
            FailureStage::Download => FailureKind::DownloadFailed,
            FailureStage::Internal => FailureKind::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// FailureInfo
// ---------------------------------------------------------------------------

/// Why a job ended abnormally. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureInfo {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_credential_failure(&self) -> bool {
        self.kind == FailureKind::CredentialInvalid
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Whether a collaborator failure means the credential is unusable.
///
/// A structured status of 401/403 always counts. Otherwise the message
/// is matched against known "entity not found" / "unauthorized" texts.
pub fn is_credential_failure(status: Option<u16>, message: &str) -> bool {
    if status.is_some_and(|s| CREDENTIAL_FAILURE_STATUSES.contains(&s)) {
        return true;
    }
    CREDENTIAL_FAILURE_RE.is_match(message)
}

/// Decide the [`FailureKind`] for a failure at `stage`.
pub fn classify_failure(stage: FailureStage, status: Option<u16>, message: &str) -> FailureKind {
    if is_credential_failure(status, message) {
        FailureKind::CredentialInvalid
    } else {
        stage.default_kind()
    }
}

/// Build the [`FailureInfo`] for a failure, with the user-facing message.
///
/// Credential failures get a fixed prompt to re-select the key; the raw
/// cause stays in the logs. Other kinds keep the cause in the message.
pub fn classify(stage: FailureStage, status: Option<u16>, message: &str) -> FailureInfo {
    let kind = classify_failure(stage, status, message);
    let text = match (kind, stage) {
        (FailureKind::CredentialInvalid, _) => MSG_CREDENTIAL_INVALID.to_string(),
        (_, FailureStage::Poll) => format!("{MSG_POLL_FAILED} {message}"),
        (_, FailureStage::Download) => format!("Failed to download video: {message}"),
        (FailureKind::ArtifactMissing, _) => MSG_ARTIFACT_MISSING.to_string(),
        _ => format!("An error occurred: {message}"),
    };
    FailureInfo::new(kind, text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Credential detection --

    #[test]
    fn entity_not_found_is_credential_failure() {
        assert!(is_credential_failure(None, "Requested entity was not found."));
        assert!(is_credential_failure(
            Some(404),
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#
        ));
    }

    #[test]
    fn unauthorized_texts_match_case_insensitively() {
        assert!(is_credential_failure(None, "UNAUTHORIZED"));
        assert!(is_credential_failure(None, "API key not valid. Please pass a valid API key."));
        assert!(is_credential_failure(None, "PERMISSION_DENIED"));
    }

    #[test]
    fn auth_statuses_match_without_text() {
        assert!(is_credential_failure(Some(401), "nope"));
        assert!(is_credential_failure(Some(403), ""));
        assert!(!is_credential_failure(Some(500), "Internal error"));
    }

    #[test]
    fn plain_not_found_is_not_credential_failure() {
        assert!(!is_credential_failure(Some(404), "Not Found"));
    }

    // -- Stage defaults --

    #[test]
    fn unmatched_failures_classify_by_stage() {
        assert_eq!(classify_failure(FailureStage::Submit, None, "quota"), FailureKind::OperationFailed);
        assert_eq!(classify_failure(FailureStage::Poll, None, "503"), FailureKind::OperationFailed);
        assert_eq!(classify_failure(FailureStage::Operation, None, "safety"), FailureKind::OperationFailed);
        assert_eq!(classify_failure(FailureStage::Resolve, None, ""), FailureKind::ArtifactMissing);
        assert_eq!(classify_failure(FailureStage::Download, None, "Bad Gateway"), FailureKind::DownloadFailed);
        assert_eq!(classify_failure(FailureStage::Internal, None, "panic"), FailureKind::Unknown);
    }

    #[test]
    fn credential_failure_wins_at_every_stage() {
        for stage in [
            FailureStage::Submit,
            FailureStage::Poll,
            FailureStage::Operation,
            FailureStage::Resolve,
            FailureStage::Download,
            FailureStage::Internal,
        ] {
            assert_eq!(
                classify_failure(stage, None, "Requested entity was not found"),
                FailureKind::CredentialInvalid
            );
        }
    }

    // -- Messages --

    #[test]
    fn credential_message_prompts_reselection() {
        let info = classify(FailureStage::Poll, None, "Requested entity was not found");
        assert_eq!(info.kind, FailureKind::CredentialInvalid);
        assert_eq!(info.message, MSG_CREDENTIAL_INVALID);
    }

    #[test]
    fn download_message_carries_status_text() {
        let info = classify(FailureStage::Download, Some(502), "Bad Gateway");
        assert_eq!(info.kind, FailureKind::DownloadFailed);
        assert_eq!(info.message, "Failed to download video: Bad Gateway");
    }

    #[test]
    fn submit_message_carries_cause() {
        let info = classify(FailureStage::Submit, Some(400), "prompt rejected");
        assert_eq!(info.message, "An error occurred: prompt rejected");
    }

    #[test]
    fn poll_message_has_status_prefix() {
        let info = classify(FailureStage::Poll, None, "connection reset");
        assert!(info.message.starts_with(MSG_POLL_FAILED));
        assert!(info.message.ends_with("connection reset"));
    }
}
