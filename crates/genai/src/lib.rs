//! HTTP collaborators for the generative-language video API.
//!
//! Provides the REST wrapper that submits and polls long-running video
//! operations, the artifact downloader, wire message types, and a
//! credential selector backed by the environment and the terminal.

pub mod api;
pub mod artifact;
pub mod messages;
pub mod selector;

use std::time::Duration;

/// Default REST base for the generative-language API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default per-request timeout for every HTTP call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Header carrying the API key on REST calls.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Build the shared [`reqwest::Client`] used by the API and the downloader.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}
