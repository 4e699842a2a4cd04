//! Credential gate: the single source of truth for whether generation is
//! currently permitted.
//!
//! The selector collaborator is injected at construction. State is held
//! in a [`tokio::sync::watch`] channel so the presentation layer and the
//! job controller can both observe changes.
//!
//! Writers are not serialised beyond the channel itself: if
//! [`request_selection`](CredentialGate::request_selection) and
//! [`invalidate`](CredentialGate::invalidate) race, whichever write lands
//! last wins.

use std::sync::Arc;

use scenecast_core::collaborators::{CredentialSelector, SelectorError};
use scenecast_core::credential::{Credential, CredentialState};
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Generation was attempted while no credential is selected.
    #[error("No credential selected (state: {0})")]
    NotSelected(CredentialState),

    /// The selector reported a selection but holds no usable key.
    #[error("Selected credential is missing or blank")]
    MissingCredential,

    #[error(transparent)]
    Selection(#[from] SelectorError),
}

pub struct CredentialGate {
    selector: Arc<dyn CredentialSelector>,
    state: watch::Sender<CredentialState>,
}

impl CredentialGate {
    /// A gate in the `Unknown` state.
    pub fn new(selector: Arc<dyn CredentialSelector>) -> Self {
        let (state, _) = watch::channel(CredentialState::Unknown);
        Self { selector, state }
    }

    pub fn state(&self) -> CredentialState {
        *self.state.borrow()
    }

    pub fn is_selected(&self) -> bool {
        self.state().permits_generation()
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.state.subscribe()
    }

    /// Ask the selector once whether a credential is already selected.
    ///
    /// The state is `Checking` while the query is pending. Selector errors
    /// resolve to `Unselected` and are only logged.
    pub async fn check_initial(&self) -> CredentialState {
        self.set(CredentialState::Checking);

        let next = match self.selector.has_selection().await {
            Ok(true) => CredentialState::Selected,
            Ok(false) => CredentialState::Unselected,
            Err(e) => {
                tracing::warn!(error = %e, "Credential check failed, assuming no credential");
                CredentialState::Unselected
            }
        };

        self.set(next);
        tracing::info!(state = %next, "Initial credential check complete");
        next
    }

    /// Run the external selection flow.
    ///
    /// A successful flow is trusted and moves the gate to `Selected`
    /// without re-querying the selector. On failure the gate is left
    /// `Unselected` and the error is returned.
    pub async fn request_selection(&self) -> Result<CredentialState, GateError> {
        match self.selector.open_selection_flow().await {
            Ok(()) => {
                self.set(CredentialState::Selected);
                tracing::info!("Credential selected");
                Ok(CredentialState::Selected)
            }
            Err(e) => {
                tracing::error!(error = %e, "Credential selection failed");
                self.set(CredentialState::Unselected);
                Err(GateError::Selection(e))
            }
        }
    }

    /// Force the gate back to `Unselected`. Idempotent.
    ///
    /// Called when a downstream authorisation failure shows the current
    /// credential is unusable; any in-flight job observes this at its next
    /// wake and is abandoned.
    pub fn invalidate(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == CredentialState::Unselected {
                false
            } else {
                *state = CredentialState::Unselected;
                true
            }
        });
        if changed {
            tracing::warn!("Credential invalidated, re-selection required");
        }
    }

    /// The credential to attach to remote calls.
    pub async fn credential(&self) -> Result<Credential, GateError> {
        let state = self.state();
        if !state.permits_generation() {
            return Err(GateError::NotSelected(state));
        }
        match self.selector.current_credential().await? {
            Some(credential) if !credential.is_blank() => Ok(credential),
            _ => Err(GateError::MissingCredential),
        }
    }

    fn set(&self, next: CredentialState) {
        self.state.send_replace(next);
    }
}
