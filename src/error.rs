/// Fallback when a failed response carries no usable `detail`.
pub const GENERIC_SERVER_FAILURE: &str = "Processing failed";

/// Fallback when a caught error has an empty message.
pub const GENERIC_PROCESSING_FAILURE: &str = "An error occurred during processing";

/// Everything that can end a submission attempt (or refuse to start one).
///
/// The `Display` text of each variant is the exact message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("Please select a file first")]
    NoFileSelected,

    #[error("Please select an image or video file")]
    UnsupportedFileType,

    /// Background image option was given a file that is not an image.
    #[error("Background image must be an image file")]
    BackgroundNotImage,

    #[error("A submission is already in progress")]
    AlreadyProcessing,

    /// Network failure, unreachable endpoint, malformed URL.
    #[error("{}", non_empty(.0))]
    Transport(String),

    /// Non-2xx response; holds the extracted `detail` or the generic fallback.
    #[error("{0}")]
    Server(String),

    #[error("Received empty video file")]
    EmptyVideo,

    #[error("Unexpected content type: {}", .0.as_deref().unwrap_or("none"))]
    UnexpectedContentType(Option<String>),

    /// The result bytes could not be turned into a local resource.
    #[error("{}", non_empty(.0))]
    Materialize(String),
}

fn non_empty(message: &str) -> &str {
    if message.trim().is_empty() {
        GENERIC_PROCESSING_FAILURE
    } else {
        message
    }
}
