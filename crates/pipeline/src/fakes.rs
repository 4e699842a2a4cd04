//! In-memory collaborators for tests and offline runs.
//!
//! Provides `FakeSelector`, `ScriptedOperationService`, and
//! `MemoryArtifactStore`, which satisfy the collaborator contracts without
//! any network access and record the calls made against them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use scenecast_core::collaborators::{
    ArtifactStore, CredentialSelector, FetchOutcome, OperationService, PollOutcome, SelectorError,
    ServiceError,
};
use scenecast_core::credential::Credential;
use scenecast_core::generation::GenerationRequest;
use scenecast_core::job::OperationHandle;
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// FakeSelector
// ---------------------------------------------------------------------------

/// Credential selector with a scripted answer for each operation.
#[derive(Debug)]
pub struct FakeSelector {
    has_selection: Mutex<Result<bool, SelectorError>>,
    open_result: Mutex<Result<(), SelectorError>>,
    credential: Mutex<Option<Credential>>,
    open_calls: Mutex<u32>,
    check_hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeSelector {
    /// A selector that already holds `key`.
    pub fn with_key(key: &str) -> Self {
        Self {
            has_selection: Mutex::new(Ok(true)),
            open_result: Mutex::new(Ok(())),
            credential: Mutex::new(Some(Credential::new(key))),
            open_calls: Mutex::new(0),
            check_hold: Mutex::new(None),
        }
    }

    /// A selector with nothing selected whose flow selects `key`.
    pub fn empty_then(key: &str) -> Self {
        let selector = Self::with_key(key);
        *lock(&selector.has_selection) = Ok(false);
        selector
    }

    pub fn fail_check(self, error: SelectorError) -> Self {
        *lock(&self.has_selection) = Err(error);
        self
    }

    pub fn fail_open(self, error: SelectorError) -> Self {
        *lock(&self.open_result) = Err(error);
        self
    }

    pub fn clear_credential(&self) {
        *lock(&self.credential) = None;
    }

    pub fn open_calls(&self) -> u32 {
        *lock(&self.open_calls)
    }

    /// Make the next `has_selection` call block until [`release_check`](Self::release_check).
    pub fn hold_check(&self) {
        *lock(&self.check_hold) = Some(Arc::new(Notify::new()));
    }

    pub fn release_check(&self) {
        if let Some(notify) = lock(&self.check_hold).take() {
            notify.notify_one();
        }
    }
}

#[async_trait]
impl CredentialSelector for FakeSelector {
    async fn has_selection(&self) -> Result<bool, SelectorError> {
        let hold = lock(&self.check_hold).clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        lock(&self.has_selection).clone()
    }

    async fn open_selection_flow(&self) -> Result<(), SelectorError> {
        *lock(&self.open_calls) += 1;
        lock(&self.open_result).clone()
    }

    async fn current_credential(&self) -> Result<Option<Credential>, SelectorError> {
        Ok(lock(&self.credential).clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedOperationService
// ---------------------------------------------------------------------------

/// Operation service that replays scripted responses.
///
/// Submissions hand out `operations/op-1`, `operations/op-2`, ... unless a
/// submit error is queued. Each handle has its own queue of poll
/// responses; an exhausted queue answers "still running". A handle can be
/// held so its next poll blocks until [`release`](Self::release).
#[derive(Debug, Default)]
pub struct ScriptedOperationService {
    submit_errors: Mutex<VecDeque<ServiceError>>,
    polls: Mutex<HashMap<String, VecDeque<Result<PollOutcome, ServiceError>>>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    entered: Arc<Notify>,
    submitted: Mutex<Vec<GenerationRequest>>,
    poll_calls: Mutex<Vec<String>>,
}

impl ScriptedOperationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the handle returned by the `n`-th submission (1-based).
    pub fn handle_name(n: usize) -> String {
        format!("operations/op-{n}")
    }

    pub fn fail_next_submit(&self, error: ServiceError) {
        lock(&self.submit_errors).push_back(error);
    }

    /// Queue poll responses for the handle named `handle`.
    pub fn script_polls<I>(&self, handle: &str, responses: I)
    where
        I: IntoIterator<Item = Result<PollOutcome, ServiceError>>,
    {
        lock(&self.polls)
            .entry(handle.to_string())
            .or_default()
            .extend(responses);
    }

    /// Make the next poll of `handle` block until released.
    pub fn hold(&self, handle: &str) {
        lock(&self.holds).insert(handle.to_string(), Arc::new(Notify::new()));
    }

    /// Let a held poll of `handle` return.
    pub fn release(&self, handle: &str) {
        if let Some(notify) = lock(&self.holds).remove(handle) {
            notify.notify_one();
        }
    }

    /// Resolves once a poll call has started (held or not).
    pub async fn poll_entered(&self) {
        self.entered.notified().await;
    }

    pub fn submitted(&self) -> Vec<GenerationRequest> {
        lock(&self.submitted).clone()
    }

    pub fn poll_calls(&self) -> Vec<String> {
        lock(&self.poll_calls).clone()
    }
}

#[async_trait]
impl OperationService for ScriptedOperationService {
    async fn submit(
        &self,
        request: &GenerationRequest,
        _credential: &Credential,
    ) -> Result<OperationHandle, ServiceError> {
        if let Some(error) = lock(&self.submit_errors).pop_front() {
            return Err(error);
        }
        let mut submitted = lock(&self.submitted);
        submitted.push(request.clone());
        Ok(OperationHandle::new(Self::handle_name(submitted.len())))
    }

    async fn poll(
        &self,
        handle: &OperationHandle,
        _credential: &Credential,
    ) -> Result<PollOutcome, ServiceError> {
        lock(&self.poll_calls).push(handle.as_str().to_string());
        self.entered.notify_one();

        let hold = lock(&self.holds).get(handle.as_str()).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        lock(&self.polls)
            .get_mut(handle.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(PollOutcome::pending()))
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactStore
// ---------------------------------------------------------------------------

/// Artifact store backed by a `HashMap<uri, response>`.
///
/// Unknown URIs answer `404 Not Found`.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    responses: Mutex<HashMap<String, Result<FetchOutcome, ServiceError>>>,
    fetched: Mutex<Vec<String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, bytes: Vec<u8>) {
        lock(&self.responses).insert(
            uri.to_string(),
            Ok(FetchOutcome::success(bytes, Some("video/mp4".to_string()))),
        );
    }

    pub fn respond(&self, uri: &str, response: Result<FetchOutcome, ServiceError>) {
        lock(&self.responses).insert(uri.to_string(), response);
    }

    /// URIs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn fetch(&self, uri: &str, _credential: &Credential) -> Result<FetchOutcome, ServiceError> {
        lock(&self.fetched).push(uri.to_string());
        lock(&self.responses)
            .get(uri)
            .cloned()
            .unwrap_or_else(|| Ok(FetchOutcome::failure(404, "Not Found")))
    }
}
