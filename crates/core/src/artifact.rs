//! Locally held video artifacts.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::types::Timestamp;

/// Content type assumed when the artifact store does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// URI scheme of [`LocalArtifact::locator`].
pub const LOCATOR_SCHEME: &str = "artifact";

/// Opaque handle to downloaded artifact bytes.
///
/// Cloning shares the underlying buffer. The presentation layer addresses
/// the artifact through [`locator`](Self::locator) or reads the bytes
/// directly.
#[derive(Clone)]
pub struct LocalArtifact {
    id: Uuid,
    bytes: Arc<[u8]>,
    content_type: String,
    fetched_at: Timestamp,
}

impl LocalArtifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>, content_type: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes: bytes.into(),
            content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            fetched_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Locally addressable name, e.g. `artifact://0191...`.
    pub fn locator(&self) -> String {
        format!("{LOCATOR_SCHEME}://{}", self.id)
    }

    /// File extension matching the content type, for writing to disk.
    pub fn file_extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mp4",
        }
    }
}

impl fmt::Debug for LocalArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalArtifact")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl PartialEq for LocalArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_bytes() {
        let artifact = LocalArtifact::new(vec![1u8, 2, 3], None);
        let copy = artifact.clone();
        assert_eq!(artifact, copy);
        assert_eq!(copy.bytes(), &[1, 2, 3]);
        assert_eq!(copy.content_type(), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn locator_uses_artifact_scheme() {
        let artifact = LocalArtifact::new(vec![0u8], None);
        assert_eq!(artifact.locator(), format!("artifact://{}", artifact.id()));
    }

    #[test]
    fn extension_follows_content_type() {
        let webm = LocalArtifact::new(vec![0u8], Some("video/webm".into()));
        assert_eq!(webm.file_extension(), "webm");
        let unknown = LocalArtifact::new(vec![0u8], Some("application/octet-stream".into()));
        assert_eq!(unknown.file_extension(), "mp4");
    }

    #[test]
    fn debug_omits_payload() {
        let artifact = LocalArtifact::new(vec![7u8; 4096], None);
        let rendered = format!("{artifact:?}");
        assert!(rendered.contains("size_bytes: 4096"));
    }
}
