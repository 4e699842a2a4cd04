//! Single-slot generation job controller.
//!
//! [`GenerationJobController`] owns at most one [`GenerationJob`]. A new
//! [`submit`](GenerationJobController::submit) preempts whatever is in
//! the slot: the old job's task is cancelled and anything it produces
//! afterwards is discarded. There is no queue.
//!
//! Each accepted submission bumps the slot's generation counter. Every
//! state write made by a job task is tagged with the generation it was
//! started under and dropped if the slot has moved on, so late poll
//! responses from a preempted job never reach observers.
//!
//! Cancellation is cooperative: a job notices preemption or credential
//! invalidation only while waiting between polls or right after a remote
//! call returns. In-flight requests are never aborted mid-way.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scenecast_core::artifact::LocalArtifact;
use scenecast_core::collaborators::{ArtifactStore, OperationService};
use scenecast_core::credential::{Credential, CredentialState};
use scenecast_core::error::CoreError;
use scenecast_core::failure::{
    classify, FailureInfo, FailureKind, FailureStage, MSG_ARTIFACT_MISSING,
    MSG_CREDENTIAL_INVALID, MSG_CREDENTIAL_REVOKED, MSG_JOB_STOPPED, MSG_POLL_TIMEOUT,
};
use scenecast_core::generation::GenerationRequest;
use scenecast_core::job::{GenerationJob, JobStatus, OperationHandle};
use scenecast_core::types::Generation;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{PollConfig, SHUTDOWN_GRACE};
use crate::events::{GenerationEvent, EVENT_CHANNEL_CAPACITY};
use crate::gate::{CredentialGate, GateError};

/// Stand-in deadline for poll intervals too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What observers see: the slot's current generation and its job, if any.
///
/// `job == None` means the controller is `Idle`.
#[derive(Debug, Clone, Default)]
pub struct JobSnapshot {
    pub generation: Generation,
    pub job: Option<GenerationJob>,
}

impl JobSnapshot {
    pub fn status(&self) -> JobStatus {
        self.job.as_ref().map_or(JobStatus::Idle, |job| job.status)
    }
}

/// Receipt for an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub generation: Generation,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Submission is only accepted while a credential is selected.
    #[error("Generation requires a selected credential (state: {0})")]
    CredentialNotSelected(CredentialState),

    #[error("Invalid generation request: {0}")]
    InvalidRequest(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one generation job at a time from submission to a terminal
/// state. Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct GenerationJobController {
    inner: Arc<Inner>,
}

struct Inner {
    gate: Arc<CredentialGate>,
    operations: Arc<dyn OperationService>,
    artifacts: Arc<dyn ArtifactStore>,
    config: PollConfig,
    snapshot: watch::Sender<JobSnapshot>,
    events: broadcast::Sender<GenerationEvent>,
    active: Mutex<Option<ActiveJob>>,
}

/// Bookkeeping for the task driving the current job.
struct ActiveJob {
    job_id: Uuid,
    generation: Generation,
    cancel: CancellationToken,
    task_handle: tokio::task::JoinHandle<()>,
}

/// Why a job task stopped before reaching `Ready`.
enum Halt {
    Failed(FailureInfo),
    /// A newer submission (or shutdown) took the slot.
    Superseded,
    /// The credential gate left `Selected` while the job was running.
    Revoked,
}

impl GenerationJobController {
    pub fn new(
        gate: Arc<CredentialGate>,
        operations: Arc<dyn OperationService>,
        artifacts: Arc<dyn ArtifactStore>,
        config: PollConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(JobSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                gate,
                operations,
                artifacts,
                config,
                snapshot,
                events,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn gate(&self) -> &Arc<CredentialGate> {
        &self.inner.gate
    }

    /// Start a new job, discarding any job currently in the slot.
    ///
    /// Rejected without creating a job when the credential gate is not
    /// `Selected` or the request is invalid. Remote failures never surface
    /// here; they end up in the job's [`FailureInfo`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: GenerationRequest) -> Result<JobTicket, SubmitError> {
        let state = self.inner.gate.state();
        if !state.permits_generation() {
            tracing::warn!(state = %state, "Submission rejected: no credential selected");
            return Err(SubmitError::CredentialNotSelected(state));
        }
        request.validate()?;

        let mut active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Only submit() changes the generation, and it holds `active`.
        let generation = self.inner.snapshot.borrow().generation + 1;
        let job = GenerationJob::new(generation, request.clone());
        let ticket = JobTicket {
            job_id: job.id,
            generation,
        };
        self.inner.snapshot.send_replace(JobSnapshot {
            generation,
            job: Some(job),
        });

        if let Some(previous) = active.take() {
            tracing::info!(
                previous_job_id = %previous.job_id,
                "Preempting previous generation job",
            );
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let task_handle = tokio::spawn(async move {
            inner.drive(ticket, request, task_cancel).await;
        });

        *active = Some(ActiveJob {
            job_id: ticket.job_id,
            generation: ticket.generation,
            cancel,
            task_handle,
        });

        tracing::info!(
            job_id = %ticket.job_id,
            generation = ticket.generation,
            "Generation job submitted",
        );
        Ok(ticket)
    }

    /// Return a terminal job to `Idle`. No-op while a job is in flight.
    pub fn acknowledge(&self) -> bool {
        // Held across the snapshot write so a concurrent submit cannot
        // install its job in between.
        let mut active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut cleared_id = None;
        self.inner.snapshot.send_if_modified(|snap| match snap.job.as_ref() {
            Some(job) if job.status.can_transition_to(JobStatus::Idle) => {
                cleared_id = Some(job.id);
                snap.job = None;
                true
            }
            _ => false,
        });

        let Some(job_id) = cleared_id else {
            return false;
        };
        if active.as_ref().is_some_and(|a| a.job_id == job_id) {
            active.take();
        }
        true
    }

    // ---- observers ----

    pub fn current_status(&self) -> JobStatus {
        self.inner.snapshot.borrow().status()
    }

    pub fn current_result(&self) -> Option<LocalArtifact> {
        self.inner
            .snapshot
            .borrow()
            .job
            .as_ref()
            .and_then(|job| job.artifact.clone())
    }

    pub fn current_failure(&self) -> Option<FailureInfo> {
        self.inner
            .snapshot
            .borrow()
            .job
            .as_ref()
            .and_then(|job| job.failure.clone())
    }

    pub fn current_job(&self) -> Option<GenerationJob> {
        self.inner.snapshot.borrow().job.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receive every subsequent snapshot change.
    pub fn watch(&self) -> watch::Receiver<JobSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the ticket's job reaches `Ready` or `Failed`.
    ///
    /// Returns `None` if the job leaves the slot first (preempted or
    /// acknowledged).
    pub async fn wait_until_settled(&self, ticket: JobTicket) -> Option<GenerationJob> {
        let mut rx = self.inner.snapshot.subscribe();
        loop {
            {
                let snap = rx.borrow_and_update();
                if snap.generation != ticket.generation {
                    return None;
                }
                match snap.job.as_ref() {
                    Some(job) if job.status.is_terminal() => return Some(job.clone()),
                    Some(_) => {}
                    None => return None,
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Cancel the active job and wait briefly for its task to exit.
    ///
    /// A job still in flight is recorded as `Failed` so observers and
    /// [`wait_until_settled`](Self::wait_until_settled) see it end.
    pub async fn shutdown(&self) {
        let active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(active) = active else {
            return;
        };

        tracing::info!(job_id = %active.job_id, "Stopping generation job");
        active.cancel.cancel();

        let in_flight = self
            .inner
            .snapshot
            .borrow()
            .job
            .as_ref()
            .is_some_and(|job| job.generation == active.generation && job.status.is_in_flight());
        if in_flight {
            let ticket = JobTicket {
                job_id: active.job_id,
                generation: active.generation,
            };
            self.inner.record_failure(
                ticket,
                FailureInfo::new(FailureKind::Unknown, MSG_JOB_STOPPED),
            );
        }

        let _ = tokio::time::timeout(SHUTDOWN_GRACE, active.task_handle).await;
    }
}

// ---------------------------------------------------------------------------
// Job task
// ---------------------------------------------------------------------------

impl Inner {
    /// Run one job to completion and publish its outcome.
    async fn drive(&self, ticket: JobTicket, request: GenerationRequest, cancel: CancellationToken) {
        let outcome = self.execute(ticket, &request, &cancel).await;

        match outcome {
            Ok(artifact) => {
                let locator = artifact.locator();
                let size_bytes = artifact.size_bytes();
                if self.update(ticket.generation, |job| job.complete(artifact)) {
                    tracing::info!(
                        job_id = %ticket.job_id,
                        locator = %locator,
                        size_bytes,
                        "Generation job ready",
                    );
                    self.emit(GenerationEvent::Ready {
                        job_id: ticket.job_id,
                        generation: ticket.generation,
                        locator,
                        size_bytes,
                    });
                }
            }
            Err(Halt::Failed(failure)) => {
                self.fail_job(ticket, failure);
            }
            Err(Halt::Revoked) => {
                self.record_failure(
                    ticket,
                    FailureInfo::new(FailureKind::CredentialInvalid, MSG_CREDENTIAL_REVOKED),
                );
            }
            Err(Halt::Superseded) => {
                tracing::info!(
                    job_id = %ticket.job_id,
                    generation = ticket.generation,
                    "Generation job superseded, discarding its results",
                );
                self.emit(GenerationEvent::Superseded {
                    job_id: ticket.job_id,
                    generation: ticket.generation,
                });
            }
        }
    }

    async fn execute(
        &self,
        ticket: JobTicket,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<LocalArtifact, Halt> {
        let credential = self.credential().await?;
        let mut credential_rx = self.gate.subscribe();

        // ---- submit ----
        let submitted = self.operations.submit(request, &credential).await;
        self.ensure_current(ticket.generation, cancel)?;
        let handle = submitted.map_err(|e| {
            tracing::error!(job_id = %ticket.job_id, error = %e, "Video generation submission failed");
            Halt::Failed(classify(FailureStage::Submit, e.status(), &e.to_string()))
        })?;

        let recorded = handle.clone();
        self.update(ticket.generation, move |job| {
            job.operation = Some(recorded);
            job.transition(JobStatus::Polling)
        });
        self.emit(GenerationEvent::Submitted {
            job_id: ticket.job_id,
            generation: ticket.generation,
            operation: handle.to_string(),
        });

        // ---- poll ----
        let artifact_uri = self
            .poll_until_done(ticket, &handle, &credential, cancel, &mut credential_rx)
            .await?;

        let uri = artifact_uri.clone();
        self.update(ticket.generation, move |job| job.resolve(uri));
        self.emit(GenerationEvent::Resolved {
            job_id: ticket.job_id,
            generation: ticket.generation,
            artifact_uri: artifact_uri.clone(),
        });

        // ---- fetch ----
        self.update(ticket.generation, |job| job.transition(JobStatus::Fetching));
        let fetched = self.artifacts.fetch(&artifact_uri, &credential).await;
        self.ensure_current(ticket.generation, cancel)?;

        match fetched {
            Ok(outcome) if outcome.ok => Ok(LocalArtifact::new(outcome.bytes, outcome.content_type)),
            Ok(outcome) => {
                tracing::error!(
                    job_id = %ticket.job_id,
                    status = outcome.status,
                    status_text = %outcome.status_text,
                    "Artifact download returned a non-success status",
                );
                Err(Halt::Failed(classify(
                    FailureStage::Download,
                    Some(outcome.status),
                    &outcome.status_text,
                )))
            }
            Err(e) => {
                tracing::error!(job_id = %ticket.job_id, error = %e, "Artifact download failed");
                Err(Halt::Failed(classify(FailureStage::Download, e.status(), &e.to_string())))
            }
        }
    }

    /// Probe the operation every poll interval until it reports done.
    ///
    /// Returns the artifact URI of a successful operation.
    async fn poll_until_done(
        &self,
        ticket: JobTicket,
        handle: &OperationHandle,
        credential: &Credential,
        cancel: &CancellationToken,
        credential_rx: &mut watch::Receiver<CredentialState>,
    ) -> Result<String, Halt> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            self.pause(ticket.generation, cancel, credential_rx).await?;

            if let Some(max_wait) = self.config.max_wait {
                if started.elapsed() >= max_wait {
                    tracing::error!(
                        job_id = %ticket.job_id,
                        attempts = attempt,
                        max_wait_secs = max_wait.as_secs(),
                        "Gave up waiting for video generation operation",
                    );
                    return Err(Halt::Failed(FailureInfo::new(
                        FailureKind::OperationFailed,
                        MSG_POLL_TIMEOUT,
                    )));
                }
            }

            attempt += 1;
            let polled = self.operations.poll(handle, credential).await;
            self.ensure_current(ticket.generation, cancel)?;

            let outcome = polled.map_err(|e| {
                tracing::error!(
                    job_id = %ticket.job_id,
                    attempt,
                    error = %e,
                    "Error polling operation status",
                );
                Halt::Failed(classify(FailureStage::Poll, e.status(), &e.to_string()))
            })?;

            self.update(ticket.generation, |job| {
                job.poll_count = attempt;
                Ok(())
            });
            self.emit(GenerationEvent::PollTick {
                job_id: ticket.job_id,
                generation: ticket.generation,
                attempt,
                done: outcome.done,
            });
            tracing::debug!(job_id = %ticket.job_id, attempt, done = outcome.done, "Polled operation");

            if !outcome.done {
                continue;
            }

            if let Some(raw_error) = outcome.raw_error {
                tracing::error!(job_id = %ticket.job_id, error = %raw_error, "Operation finished with an error");
                return Err(Halt::Failed(classify(FailureStage::Operation, None, &raw_error)));
            }

            return match outcome.artifact_uri.filter(|uri| !uri.trim().is_empty()) {
                Some(uri) => Ok(uri),
                None => {
                    tracing::error!(job_id = %ticket.job_id, "Operation completed without an artifact URI");
                    Err(Halt::Failed(classify(
                        FailureStage::Resolve,
                        None,
                        MSG_ARTIFACT_MISSING,
                    )))
                }
            };
        }
    }

    /// Sleep one poll interval, waking early on preemption or when the
    /// credential gate leaves `Selected`.
    async fn pause(
        &self,
        generation: Generation,
        cancel: &CancellationToken,
        credential_rx: &mut watch::Receiver<CredentialState>,
    ) -> Result<(), Halt> {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.config.interval)
            .unwrap_or_else(|| now + FAR_FUTURE);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => break,
                changed = credential_rx.changed() => {
                    if changed.is_err() || !credential_rx.borrow_and_update().permits_generation() {
                        break;
                    }
                }
            }
        }
        self.ensure_current(generation, cancel)
    }

    /// Fail fast if this job no longer owns the slot or lost its credential.
    fn ensure_current(&self, generation: Generation, cancel: &CancellationToken) -> Result<(), Halt> {
        if cancel.is_cancelled() || self.snapshot.borrow().generation != generation {
            return Err(Halt::Superseded);
        }
        if !self.gate.is_selected() {
            return Err(Halt::Revoked);
        }
        Ok(())
    }

    async fn credential(&self) -> Result<Credential, Halt> {
        match self.gate.credential().await {
            Ok(credential) => Ok(credential),
            Err(GateError::NotSelected(_)) => Err(Halt::Revoked),
            Err(e) => {
                tracing::error!(error = %e, "No usable credential for generation job");
                Err(Halt::Failed(FailureInfo::new(
                    FailureKind::CredentialInvalid,
                    MSG_CREDENTIAL_INVALID,
                )))
            }
        }
    }

    /// Apply `f` to the job if it still belongs to `generation`.
    ///
    /// Returns whether the write landed. Stale writes and illegal
    /// transitions are dropped.
    fn update<F>(&self, generation: Generation, f: F) -> bool
    where
        F: FnOnce(&mut GenerationJob) -> Result<(), CoreError>,
    {
        self.snapshot.send_if_modified(|snap| {
            if snap.generation != generation {
                return false;
            }
            let Some(job) = snap.job.as_mut() else {
                return false;
            };
            match f(job) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Dropped job state write");
                    false
                }
            }
        })
    }

    /// Record `failure` and, if it still owned the slot and the failure is a
    /// credential failure, invalidate the gate.
    fn fail_job(&self, ticket: JobTicket, failure: FailureInfo) -> bool {
        let credential_failure = failure.is_credential_failure();
        let landed = self.record_failure(ticket, failure);
        if landed && credential_failure {
            self.gate.invalidate();
        }
        landed
    }

    /// Returns whether the write landed.
    fn record_failure(&self, ticket: JobTicket, failure: FailureInfo) -> bool {
        let recorded = failure.clone();
        let landed = self.update(ticket.generation, move |job| job.fail(recorded));
        if landed {
            tracing::warn!(
                job_id = %ticket.job_id,
                kind = %failure.kind,
                message = %failure.message,
                "Generation job failed",
            );
            self.emit(GenerationEvent::Failed {
                job_id: ticket.job_id,
                generation: ticket.generation,
                failure,
            });
        }
        landed
    }

    fn emit(&self, event: GenerationEvent) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeSelector, MemoryArtifactStore, ScriptedOperationService};

    async fn idle_controller() -> GenerationJobController {
        let gate = Arc::new(CredentialGate::new(Arc::new(FakeSelector::with_key("k"))));
        gate.check_initial().await;
        GenerationJobController::new(
            gate,
            Arc::new(ScriptedOperationService::new()),
            Arc::new(MemoryArtifactStore::new()),
            PollConfig::default().with_interval(Duration::from_secs(3600)),
        )
    }

    async fn wait_for_polling(controller: &GenerationJobController) {
        let mut rx = controller.watch();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|snap| snap.status() == JobStatus::Polling),
        )
        .await
        .expect("job should reach Polling")
        .expect("controller should be alive");
    }

    fn active_job_id(controller: &GenerationJobController) -> Option<Uuid> {
        controller
            .inner
            .active
            .lock()
            .unwrap()
            .as_ref()
            .map(|active| active.job_id)
    }

    // -- acknowledge --

    #[tokio::test]
    async fn acknowledge_only_releases_its_own_task() {
        let controller = idle_controller().await;
        let ticket = controller.submit(GenerationRequest::new("live")).unwrap();
        wait_for_polling(&controller).await;

        // A terminal job in the slot that the active task does not own.
        controller.inner.snapshot.send_modify(|snap| {
            let mut job = GenerationJob::new(snap.generation, GenerationRequest::new("other"));
            job.fail(FailureInfo::new(FailureKind::OperationFailed, "boom"))
                .unwrap();
            snap.job = Some(job);
        });

        assert!(controller.acknowledge());
        assert_eq!(active_job_id(&controller), Some(ticket.job_id));

        controller.shutdown().await;
        assert_eq!(active_job_id(&controller), None);
    }

    // -- failure recording --

    #[tokio::test]
    async fn stale_credential_failure_does_not_invalidate_gate() {
        let controller = idle_controller().await;
        let stale = controller.submit(GenerationRequest::new("first")).unwrap();
        let current = controller.submit(GenerationRequest::new("second")).unwrap();
        let credential_failure =
            FailureInfo::new(FailureKind::CredentialInvalid, MSG_CREDENTIAL_INVALID);

        assert!(!controller.inner.fail_job(stale, credential_failure.clone()));
        assert_eq!(controller.gate().state(), CredentialState::Selected);
        assert!(controller.current_failure().is_none());

        assert!(controller.inner.fail_job(current, credential_failure));
        assert_eq!(controller.gate().state(), CredentialState::Unselected);

        controller.shutdown().await;
    }
}
