//! Credential selector backed by an environment variable, with a terminal
//! prompt as the selection flow.
//!
//! A key entered through the prompt is held in memory for the life of the
//! process and takes precedence over the environment.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use scenecast_core::collaborators::{CredentialSelector, SelectorError};
use scenecast_core::credential::Credential;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";

const PROMPT: &str = "Enter an API key for video generation: ";

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

pub struct EnvKeySelector {
    var: String,
    selected: Mutex<Option<Credential>>,
    input: tokio::sync::Mutex<Input>,
    interactive: bool,
}

impl EnvKeySelector {
    /// Read the key from `var`; the selection flow prompts on stdin.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            selected: Mutex::new(None),
            input: tokio::sync::Mutex::new(Box::new(BufReader::new(tokio::io::stdin()))),
            interactive: true,
        }
    }

    /// Like [`new`](Self::new) but the selection flow reads from `input`
    /// and prints no prompt.
    pub fn with_input(var: impl Into<String>, input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            var: var.into(),
            selected: Mutex::new(None),
            input: tokio::sync::Mutex::new(Box::new(input)),
            interactive: false,
        }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn selected(&self) -> Option<Credential> {
        self.selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn from_env(&self) -> Result<Option<Credential>, SelectorError> {
        match std::env::var(&self.var) {
            Ok(value) => {
                let credential = Credential::new(value.trim());
                Ok((!credential.is_blank()).then_some(credential))
            }
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(SelectorError::Unavailable(format!(
                "{} is not valid unicode",
                self.var
            ))),
        }
    }
}

#[async_trait]
impl CredentialSelector for EnvKeySelector {
    async fn has_selection(&self) -> Result<bool, SelectorError> {
        if self.selected().is_some() {
            return Ok(true);
        }
        Ok(self.from_env()?.is_some())
    }

    async fn open_selection_flow(&self) -> Result<(), SelectorError> {
        if self.interactive {
            let mut stderr = tokio::io::stderr();
            stderr
                .write_all(PROMPT.as_bytes())
                .await
                .map_err(|e| SelectorError::Io(e.to_string()))?;
            stderr
                .flush()
                .await
                .map_err(|e| SelectorError::Io(e.to_string()))?;
        }

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| SelectorError::Io(e.to_string()))?;
        if read == 0 {
            return Err(SelectorError::Cancelled);
        }

        let credential = Credential::new(line.trim());
        if credential.is_blank() {
            return Err(SelectorError::Cancelled);
        }

        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        tracing::info!("API key entered on the terminal");
        Ok(())
    }

    async fn current_credential(&self) -> Result<Option<Credential>, SelectorError> {
        match self.selected() {
            Some(credential) => Ok(Some(credential)),
            None => self.from_env(),
        }
    }
}
