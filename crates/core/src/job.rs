//! Job lifecycle state machine and the single generation job record.
//!
//! ```text
//! Idle -> Submitting -> Polling -> Resolved -> Fetching -> Ready
//!             |            |          |           |
//!             +------------+----------+-----------+--> Failed
//! ```
//!
//! Ready and Failed are terminal until the next submission (back to
//! Submitting) or an acknowledgement (back to Idle).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::LocalArtifact;
use crate::error::CoreError;
use crate::failure::FailureInfo;
use crate::generation::GenerationRequest;
use crate::types::{Generation, Timestamp};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Submitting,
    Polling,
    Resolved,
    Fetching,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Submitting => "submitting",
            JobStatus::Polling => "polling",
            JobStatus::Resolved => "resolved",
            JobStatus::Fetching => "fetching",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        }
    }

    /// Ready and Failed end a job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }

    /// A job in one of these states still has remote work outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobStatus::Submitting | JobStatus::Polling | JobStatus::Resolved | JobStatus::Fetching
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Idle | Ready | Failed, Submitting) => true,
            (Submitting, Polling) => true,
            (Polling, Resolved) => true,
            (Resolved, Fetching) => true,
            (Fetching, Ready) => true,
            (Submitting | Polling | Resolved | Fetching, Failed) => true,
            (Ready | Failed, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OperationHandle
// ---------------------------------------------------------------------------

/// Opaque token the operation service returns for a long-running job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// GenerationJob
// ---------------------------------------------------------------------------

/// The one job occupying the controller's slot.
///
/// Field invariants: `artifact_uri` is only set once the job has reached
/// `Resolved`, `artifact` only once it has reached `Ready`, and `failure`
/// only when `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub generation: Generation,
    pub operation: Option<OperationHandle>,
    pub request: GenerationRequest,
    pub status: JobStatus,
    pub artifact_uri: Option<String>,
    #[serde(skip)]
    pub artifact: Option<LocalArtifact>,
    pub failure: Option<FailureInfo>,
    pub poll_count: u32,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GenerationJob {
    /// A freshly accepted job, already in `Submitting`.
    pub fn new(generation: Generation, request: GenerationRequest) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            generation,
            operation: None,
            request,
            status: JobStatus::Submitting,
            artifact_uri: None,
            artifact: None,
            failure: None,
            poll_count: 0,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting edges the state machine does not allow.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Polling -> Resolved, recording the artifact URI.
    pub fn resolve(&mut self, artifact_uri: String) -> Result<(), CoreError> {
        self.transition(JobStatus::Resolved)?;
        self.artifact_uri = Some(artifact_uri);
        Ok(())
    }

    /// Fetching -> Ready, recording the downloaded artifact.
    pub fn complete(&mut self, artifact: LocalArtifact) -> Result<(), CoreError> {
        self.transition(JobStatus::Ready)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Any in-flight state -> Failed, recording why.
    pub fn fail(&mut self, failure: FailureInfo) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
