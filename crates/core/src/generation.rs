//! Generation request model, wire tokens, and validation.
//!
//! A [`GenerationRequest`] is immutable once handed to the job
//! controller; build it with [`GenerationRequest::new`] and the
//! `with_*` setters, then call [`GenerationRequest::validate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Generation defaults
// ---------------------------------------------------------------------------

/// Model used for video generation unless configured otherwise.
pub const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";

/// The core only ever asks for a single video per request.
pub const NUMBER_OF_OUTPUTS: u32 = 1;

/// Scene used when the caller does not supply a prompt.
pub const DEFAULT_SCENE_PROMPT: &str = "Create a re-enactment of a scene set in a Texas Walmart. \
The scene begins with a male customer discovering a broken olive oil bottle on the floor of the \
aisle, with shards of glass scattered around. The customer appears concerned and hurriedly \
searches for a store employee to report the spill and prevent any injuries. As he finds various \
employees, they smile and shrug their shoulders, indicating they do not speak English, which adds \
to his frustration. He then takes one employee by the hand and leads her to the accident site. At \
this moment, two women in electric shopping carts rush past, colliding with additional bottles \
and causing more chaos. Focus on the expressions of concern from the customer, the confusion of \
the employees, and the chaotic energy of the scene as the shopping carts crash. Use realistic \
animations and sounds to enhance the urgency and humor of the situation.";

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Output resolution token understood by the video service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hd720 => "720p",
            Resolution::Hd1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "720p" => Ok(Resolution::Hd720),
            "1080p" => Ok(Resolution::Hd1080),
            other => Err(CoreError::Validation(format!(
                "Unknown resolution '{other}'. Must be one of: 720p, 1080p"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// AspectRatio
// ---------------------------------------------------------------------------

/// Frame aspect ratio token understood by the video service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(CoreError::Validation(format!(
                "Unknown aspect ratio '{other}'. Must be one of: 16:9, 9:16"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// A single scene-to-video request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub number_of_outputs: u32,
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    /// Request with one output at 720p, 16:9.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            number_of_outputs: NUMBER_OF_OUTPUTS,
            resolution: Resolution::default(),
            aspect_ratio: AspectRatio::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Check the request before it is submitted.
    ///
    /// - The prompt must contain something other than whitespace.
    /// - Exactly [`NUMBER_OF_OUTPUTS`] output is supported.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation(
                "Scene prompt must not be empty".to_string(),
            ));
        }
        if self.number_of_outputs != NUMBER_OF_OUTPUTS {
            return Err(CoreError::Validation(format!(
                "number_of_outputs must be {NUMBER_OF_OUTPUTS}, got {}",
                self.number_of_outputs
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn new_request_uses_defaults() {
        let req = GenerationRequest::new("a cat");
        assert_eq!(req.number_of_outputs, 1);
        assert_eq!(req.resolution, Resolution::Hd720);
        assert_eq!(req.aspect_ratio, AspectRatio::Landscape);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_prompt_rejected() {
        let req = GenerationRequest::new("  \n\t ");
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn multiple_outputs_rejected() {
        let mut req = GenerationRequest::new("a cat");
        req.number_of_outputs = 2;
        assert_matches!(req.validate(), Err(CoreError::Validation(msg)) if msg.contains("got 2"));
    }

    #[test]
    fn tokens_parse_from_wire_strings() {
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::Hd1080);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("4k".parse::<Resolution>().is_err());
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn tokens_serialize_as_wire_strings() {
        let req = GenerationRequest::new("a cat").with_aspect_ratio(AspectRatio::Portrait);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["resolution"], "720p");
        assert_eq!(json["aspect_ratio"], "9:16");
    }

    #[test]
    fn default_prompt_is_valid() {
        assert!(GenerationRequest::new(DEFAULT_SCENE_PROMPT).validate().is_ok());
    }
}
