use std::path::PathBuf;

use clap::Parser;
use scenecast_core::generation::{AspectRatio, GenerationRequest, Resolution, DEFAULT_SCENE_PROMPT};

/// Generate a short video from a text prompt.
#[derive(Debug, Parser)]
#[command(name = "scenecast", version, about)]
pub struct Cli {
    /// Scene description. Defaults to a built-in sample scene.
    pub prompt: Option<String>,

    /// Output resolution (`720p` or `1080p`).
    #[arg(long, default_value_t = Resolution::default())]
    pub resolution: Resolution,

    /// Frame aspect ratio (`16:9` or `9:16`).
    #[arg(long, default_value_t = AspectRatio::default())]
    pub aspect_ratio: AspectRatio,

    /// Where to write the video. Defaults to `scenecast-<id>.<ext>` in the
    /// current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn request(&self) -> GenerationRequest {
        let prompt = self.prompt.as_deref().unwrap_or(DEFAULT_SCENE_PROMPT);
        GenerationRequest::new(prompt)
            .with_resolution(self.resolution)
            .with_aspect_ratio(self.aspect_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_sample_scene() {
        let cli = Cli::parse_from(["scenecast"]);
        let request = cli.request();
        assert_eq!(request.prompt, DEFAULT_SCENE_PROMPT);
        assert_eq!(request.resolution, Resolution::Hd720);
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape);
        assert!(cli.output.is_none());
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::parse_from([
            "scenecast",
            "a paper boat in the rain",
            "--resolution",
            "1080p",
            "--aspect-ratio",
            "9:16",
            "-o",
            "boat.mp4",
        ]);
        let request = cli.request();
        assert_eq!(request.prompt, "a paper boat in the rain");
        assert_eq!(request.resolution, Resolution::Hd1080);
        assert_eq!(request.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(cli.output, Some(PathBuf::from("boat.mp4")));
    }

    #[test]
    fn unknown_resolution_is_rejected() {
        assert!(Cli::try_parse_from(["scenecast", "--resolution", "4k"]).is_err());
    }
}
