//! Wire types for the `predictLongRunning` video endpoint.
//!
//! Submission sends `{"instances":[{"prompt":…}],"parameters":{…}}` and
//! receives an operation resource. Polling the operation returns the same
//! resource shape with `done` set once generation finishes:
//!
//! ```json
//! {
//!   "name": "models/…/operations/abc",
//!   "done": true,
//!   "response": {
//!     "generateVideoResponse": {
//!       "generatedSamples": [{ "video": { "uri": "https://…" } }]
//!     }
//!   }
//! }
//! ```

use scenecast_core::collaborators::PollOutcome;
use scenecast_core::generation::GenerationRequest;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub instances: Vec<PromptInstance<'a>>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptInstance<'a> {
    pub prompt: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    pub aspect_ratio: &'static str,
    pub resolution: &'static str,
    pub sample_count: u32,
}

impl<'a> From<&'a GenerationRequest> for PredictRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            instances: vec![PromptInstance {
                prompt: &request.prompt,
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio.as_str(),
                resolution: request.resolution.as_str(),
                sample_count: request.number_of_outputs,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Operation resource
// ---------------------------------------------------------------------------

/// A long-running operation as returned by submit and by polling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<OperationResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
    /// Reasons the service withheld samples, when safety filters fired.
    #[serde(default)]
    pub rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoRef {
    #[serde(default)]
    pub uri: Option<String>,
}

/// `google.rpc.Status` carried by a finished, failed operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    fn video_response(&self) -> Option<&GenerateVideoResponse> {
        self.response
            .as_ref()
            .and_then(|r| r.generate_video_response.as_ref())
    }

    /// URI of the first generated sample, if any.
    pub fn artifact_uri(&self) -> Option<&str> {
        self.video_response()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }

    pub fn filtered_reasons(&self) -> &[String] {
        self.video_response()
            .map(|r| r.rai_media_filtered_reasons.as_slice())
            .unwrap_or_default()
    }
}

impl From<Operation> for PollOutcome {
    fn from(operation: Operation) -> Self {
        if !operation.done {
            return PollOutcome::pending();
        }
        if let Some(error) = &operation.error {
            return match error.code {
                Some(code) => PollOutcome::done_with_error(format!("{} (code {code})", error.message)),
                None => PollOutcome::done_with_error(error.message.clone()),
            };
        }
        PollOutcome {
            done: true,
            artifact_uri: operation.artifact_uri().map(str::to_string),
            raw_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_core::generation::{AspectRatio, Resolution};

    // -- request --

    #[test]
    fn predict_request_uses_camel_case_parameters() {
        let request = GenerationRequest::new("a lighthouse at dusk")
            .with_resolution(Resolution::Hd1080)
            .with_aspect_ratio(AspectRatio::Portrait);

        let json = serde_json::to_value(PredictRequest::from(&request)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "instances": [{ "prompt": "a lighthouse at dusk" }],
                "parameters": {
                    "aspectRatio": "9:16",
                    "resolution": "1080p",
                    "sampleCount": 1
                }
            })
        );
    }

    // -- operation --

    #[test]
    fn submit_response_only_needs_a_name() {
        let op: Operation =
            serde_json::from_str(r#"{"name":"models/veo/operations/abc123"}"#).unwrap();
        assert_eq!(op.name, "models/veo/operations/abc123");
        assert!(!op.done);
        assert_eq!(PollOutcome::from(op), PollOutcome::pending());
    }

    #[test]
    fn finished_operation_yields_first_sample_uri() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "models/veo/operations/abc123",
                "done": true,
                "response": {
                    "@type": "type.googleapis.com/google.ai.generativelanguage.v1beta.PredictLongRunningResponse",
                    "generateVideoResponse": {
                        "generatedSamples": [
                            { "video": { "uri": "https://files.example/v1/video:download?alt=media" } },
                            { "video": { "uri": "https://files.example/second" } }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();

        let outcome = PollOutcome::from(op);
        assert!(outcome.done);
        assert_eq!(
            outcome.artifact_uri.as_deref(),
            Some("https://files.example/v1/video:download?alt=media")
        );
        assert!(outcome.raw_error.is_none());
    }

    #[test]
    fn finished_operation_without_samples_has_no_uri() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "ops/1",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "raiMediaFilteredReasons": ["unsafe content"]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(op.filtered_reasons(), ["unsafe content".to_string()]);
        let outcome = PollOutcome::from(op);
        assert!(outcome.done);
        assert!(outcome.artifact_uri.is_none());
    }

    #[test]
    fn failed_operation_carries_error_message() {
        let op: Operation = serde_json::from_str(
            r#"{"name":"ops/1","done":true,"error":{"code":3,"message":"prompt rejected"}}"#,
        )
        .unwrap();

        let outcome = PollOutcome::from(op);
        assert_eq!(outcome.raw_error.as_deref(), Some("prompt rejected (code 3)"));
    }
}
