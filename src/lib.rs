//! Client for a remote background-removal service.
//!
//! A [`Session`] takes one image or video file, a set of processing
//! options, submits them as a multipart request to `/remove-image` or
//! `/remove-video`, and keeps the returned bytes as a local resource.

pub mod config;
pub mod error;
pub mod media;
pub mod options;
pub mod request;
pub mod results;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::ProcessError;
pub use media::{classify, MediaKind, SourceFile};
pub use options::{Model, OptionState};
pub use request::{build_request, FieldValue, Payload};
pub use results::{DiskStore, ProcessedResult, ResourceHandle, ResourceStore};
pub use session::{Session, Submission, SubmissionState};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
