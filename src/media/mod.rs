mod source;

pub use source::{content_type_for_extension, SourceFile};

use crate::error::ProcessError;
use std::fmt;

/// Which remote pipeline a file goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Endpoint path on the background-removal service
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Image => "/remove-image",
            Self::Video => "/remove-video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Label a declared MIME type as image or video
///
/// Only the prefix matters; anything outside `image/*` and `video/*` is rejected.
pub fn classify(mime: &str) -> Result<MediaKind, ProcessError> {
    if mime.starts_with("image/") {
        Ok(MediaKind::Image)
    } else if mime.starts_with("video/") {
        Ok(MediaKind::Video)
    } else {
        Err(ProcessError::UnsupportedFileType)
    }
}
