//! Lifecycle events emitted by the job controller.
//!
//! Events complement the state snapshot: the snapshot says where the
//! current job is, events say what happened on the way. Subscribe via
//! [`GenerationJobController::subscribe`](crate::controller::GenerationJobController::subscribe).

use scenecast_core::failure::FailureInfo;
use scenecast_core::types::Generation;
use serde::Serialize;
use uuid::Uuid;

/// Broadcast channel capacity for controller events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// The service accepted the request and returned an operation handle.
    Submitted {
        job_id: Uuid,
        generation: Generation,
        operation: String,
    },

    /// One status probe finished.
    PollTick {
        job_id: Uuid,
        generation: Generation,
        attempt: u32,
        done: bool,
    },

    /// The operation finished with an artifact URI.
    Resolved {
        job_id: Uuid,
        generation: Generation,
        artifact_uri: String,
    },

    /// The artifact was downloaded and is available locally.
    Ready {
        job_id: Uuid,
        generation: Generation,
        locator: String,
        size_bytes: usize,
    },

    /// The job ended abnormally.
    Failed {
        job_id: Uuid,
        generation: Generation,
        failure: FailureInfo,
    },

    /// The job was preempted by a newer submission and its results dropped.
    Superseded { job_id: Uuid, generation: Generation },
}

impl GenerationEvent {
    pub fn generation(&self) -> Generation {
        match self {
            GenerationEvent::Submitted { generation, .. }
            | GenerationEvent::PollTick { generation, .. }
            | GenerationEvent::Resolved { generation, .. }
            | GenerationEvent::Ready { generation, .. }
            | GenerationEvent::Failed { generation, .. }
            | GenerationEvent::Superseded { generation, .. } => *generation,
        }
    }
}
