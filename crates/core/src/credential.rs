//! Credential selection state and the opaque API credential.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CredentialState
// ---------------------------------------------------------------------------

/// Whether a usable credential is currently selected for this session.
///
/// Starts as [`Unknown`](Self::Unknown) and only moves through the
/// credential gate. Generation is permitted only while [`Selected`](Self::Selected).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    /// The initial check has not run yet.
    #[default]
    Unknown,
    /// The initial check is in progress; generation UI must stay blocked.
    Checking,
    /// No usable credential. The user must go through selection.
    Unselected,
    /// A credential is selected and generation may proceed.
    Selected,
}

impl CredentialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialState::Unknown => "unknown",
            CredentialState::Checking => "checking",
            CredentialState::Unselected => "unselected",
            CredentialState::Selected => "selected",
        }
    }

    /// Only the `Selected` state permits generation.
    pub fn permits_generation(&self) -> bool {
        matches!(self, CredentialState::Selected)
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An API key handed to the remote services.
///
/// The key never appears in `Debug` output so it cannot leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Blank keys are treated as "no credential" by selectors.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
