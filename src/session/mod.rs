//! Submission orchestration for one user session.
//!
//! [`Session`] owns the selected file, the option state, the submission
//! state and the current result. Processing is split into two explicit
//! transitions so that callers which share the session across the single
//! await point still cannot start a second request:
//!
//! 1. [`Session::begin`] validates, clears stale output, captures the
//!    payload and moves to `Processing`.
//! 2. [`Session::finish`] classifies the transport outcome and moves to
//!    `Succeeded` or `Failed`.
//!
//! [`Session::process`] chains the two around one [`Transport::send`].

mod response;

pub use response::{extract_detail, interpret};

use crate::error::ProcessError;
use crate::media::{classify, MediaKind, SourceFile};
use crate::options::OptionState;
use crate::request::{build_request, Payload};
use crate::results::{ProcessedResult, ResourceHandle, ResourceStore, ResultLifecycle};
use crate::transport::{RawResponse, Transport, TransportError};
use anyhow::Result;
use std::path::Path;

/// Where the session is in the processing lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Processing,
    Succeeded(MediaKind),
    Failed(String),
}

/// A request that has been started and must be handed back to
/// [`Session::finish`] or [`Session::abandon`]
#[derive(Debug)]
pub struct Submission {
    id: u64,
    selection: u64,
    kind: MediaKind,
    payload: Payload,
}

impl Submission {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The payload exactly as captured when the submission began
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

struct Selection {
    file: SourceFile,
    kind: MediaKind,
}

pub struct Session {
    options: OptionState,
    selection: Option<Selection>,
    // Bumped on every selection so late completions can tell they are stale
    selection_generation: u64,
    selection_error: Option<String>,
    state: SubmissionState,
    results: ResultLifecycle,
    in_flight: Option<u64>,
    next_submission: u64,
}

impl Session {
    pub fn new(store: Box<dyn ResourceStore>) -> Self {
        Self::with_options(store, OptionState::default())
    }

    pub fn with_options(store: Box<dyn ResourceStore>, options: OptionState) -> Self {
        Self {
            options,
            selection: None,
            selection_generation: 0,
            selection_error: None,
            state: SubmissionState::Idle,
            results: ResultLifecycle::new(store),
            in_flight: None,
            next_submission: 0,
        }
    }

    pub fn options(&self) -> &OptionState {
        &self.options
    }

    /// Options are editable at any time; a running submission is unaffected
    pub fn options_mut(&mut self) -> &mut OptionState {
        &mut self.options
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        self.state == SubmissionState::Processing
    }

    /// Message to show the user, if any
    pub fn error(&self) -> Option<&str> {
        if let Some(message) = &self.selection_error {
            return Some(message.as_str());
        }
        match &self.state {
            SubmissionState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&ProcessedResult> {
        self.results.current()
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.selection.as_ref().map(|s| &s.file)
    }

    pub fn kind(&self) -> Option<MediaKind> {
        self.selection.as_ref().map(|s| s.kind)
    }

    /// Replace the selected file, or clear it with `None`
    ///
    /// Any previous result, preview and error are dropped first so nothing
    /// stale is shown against the new input. Files that are neither image
    /// nor video are rejected and leave nothing selected.
    pub fn select_file(&mut self, file: Option<SourceFile>) -> Result<(), ProcessError> {
        self.results.clear();
        self.results.clear_preview();
        self.selection_error = None;
        self.selection_generation += 1;
        if !self.is_processing() {
            self.state = SubmissionState::Idle;
        }

        let Some(file) = file else {
            self.selection = None;
            tracing::info!("Selection cleared");
            return Ok(());
        };

        match classify(file.mime()) {
            Ok(kind) => {
                tracing::info!(
                    "Selected {} {} ({} bytes, {})",
                    kind,
                    file.name(),
                    file.size(),
                    file.mime()
                );
                self.selection = Some(Selection { file, kind });
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rejected {} ({}): {}", file.name(), file.mime(), e);
                self.selection = None;
                self.selection_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Preview handle for the selected file, created on first use
    pub fn preview(&mut self) -> Result<Option<&ResourceHandle>> {
        match &self.selection {
            Some(selection) => Ok(Some(self.results.preview(&selection.file)?)),
            None => Ok(None),
        }
    }

    /// Copy the current result to `dest`
    pub fn save_result(&self, dest: &Path) -> Result<u64> {
        self.results.save_to(dest)
    }

    /// Start a submission
    ///
    /// Refused without any state change while another submission is
    /// outstanding. Without a selected file the session fails immediately
    /// and no request is built.
    pub fn begin(&mut self) -> Result<Submission, ProcessError> {
        if self.is_processing() {
            tracing::warn!("Ignoring process request: a submission is already in progress");
            return Err(ProcessError::AlreadyProcessing);
        }

        let Some(selection) = &self.selection else {
            let err = ProcessError::NoFileSelected;
            tracing::warn!("{}", err);
            self.selection_error = None;
            self.state = SubmissionState::Failed(err.to_string());
            return Err(err);
        };

        for warning in self.options.warnings(selection.kind) {
            tracing::warn!("{}", warning);
        }

        let kind = selection.kind;
        let payload = build_request(&selection.file, kind, &self.options);

        self.selection_error = None;
        self.results.clear();

        self.next_submission += 1;
        let id = self.next_submission;
        self.in_flight = Some(id);
        self.state = SubmissionState::Processing;

        tracing::info!(
            "Submission {} started: {} {} -> {}",
            id,
            kind,
            selection.file.name(),
            payload.path
        );
        tracing::debug!("Fields: {:?}", payload.field_names());

        Ok(Submission {
            id,
            selection: self.selection_generation,
            kind,
            payload,
        })
    }

    /// Complete a submission with whatever the transport produced
    ///
    /// A submission that is not the one in flight is ignored. If the file
    /// selection changed while it was outstanding, its outcome is discarded
    /// and the session returns to `Idle`.
    pub fn finish(
        &mut self,
        submission: Submission,
        outcome: Result<RawResponse, TransportError>,
    ) -> &SubmissionState {
        if self.in_flight != Some(submission.id) {
            tracing::warn!("Ignoring completion of stale submission {}", submission.id);
            return &self.state;
        }
        self.in_flight = None;

        let verdict = interpret(submission.kind, outcome);

        if submission.selection != self.selection_generation {
            tracing::info!(
                "Selection changed while submission {} was running, discarding its outcome",
                submission.id
            );
            self.state = SubmissionState::Idle;
            return &self.state;
        }

        self.state = match verdict.and_then(|response| self.install(submission.kind, response)) {
            Ok(kind) => {
                tracing::info!("Submission {} succeeded", submission.id);
                SubmissionState::Succeeded(kind)
            }
            Err(e) => {
                tracing::error!("Submission {} failed: {}", submission.id, e);
                SubmissionState::Failed(e.to_string())
            }
        };
        &self.state
    }

    /// Give up on a submission without an outcome
    ///
    /// Frees the in-flight slot and returns the session to `Idle` so a new
    /// submission can start. A submission that is not the one in flight is
    /// ignored.
    pub fn abandon(&mut self, submission: Submission) -> &SubmissionState {
        self.release_slot(submission.id);
        &self.state
    }

    fn release_slot(&mut self, id: u64) {
        if self.in_flight != Some(id) {
            return;
        }
        self.in_flight = None;
        self.state = SubmissionState::Idle;
        tracing::warn!("Submission {} abandoned before completion", id);
    }

    fn install(&mut self, kind: MediaKind, response: RawResponse) -> Result<MediaKind, ProcessError> {
        self.results
            .install(kind, response.content_type, &response.body)
            .map(|result| result.kind())
            .map_err(|e| ProcessError::Materialize(format!("{e:#}")))
    }

    /// Run one full submission against `transport`
    ///
    /// Issues at most one request. Every failure ends up in
    /// [`SubmissionState::Failed`]; nothing is returned as an error. If the
    /// returned future is dropped before the response arrives, the
    /// submission is abandoned and the session is left `Idle`.
    pub async fn process(&mut self, transport: &dyn Transport) -> &SubmissionState {
        let submission = match self.begin() {
            Ok(submission) => submission,
            Err(_) => return &self.state,
        };
        let outcome = {
            let slot = InFlightSlot::new(&mut *self, submission.id);
            let outcome = transport.send(submission.payload()).await;
            slot.disarm();
            outcome
        };
        self.finish(submission, outcome)
    }
}

/// Frees the in-flight slot if `process` is cancelled at its await point
struct InFlightSlot<'a> {
    session: &'a mut Session,
    id: u64,
    armed: bool,
}

impl<'a> InFlightSlot<'a> {
    fn new(session: &'a mut Session, id: u64) -> Self {
        Self {
            session,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.release_slot(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::DiskStore;
    use assert_matches::assert_matches;

    fn session() -> (Session, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();
        (Session::new(Box::new(store)), dir)
    }

    fn png() -> SourceFile {
        SourceFile::new("cat.png", "image/png", vec![1, 2, 3])
    }

    fn mp4() -> SourceFile {
        SourceFile::new("clip.mp4", "video/mp4", vec![4, 5, 6])
    }

    fn ok_video() -> RawResponse {
        RawResponse::new(200, Some("video/mp4"), &b"frames"[..])
    }

    #[test]
    fn starts_idle() {
        let (session, _dir) = session();
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert!(session.error().is_none());
        assert!(session.result().is_none());
        assert!(!session.is_processing());
    }

    #[test]
    fn rejected_file_leaves_nothing_selected() {
        let (mut session, _dir) = session();
        session.select_file(Some(png())).unwrap();

        let pdf = SourceFile::new("doc.pdf", "application/pdf", vec![1]);
        assert_matches!(session.select_file(Some(pdf)), Err(ProcessError::UnsupportedFileType));
        assert!(session.file().is_none());
        assert!(session.kind().is_none());
        assert_eq!(session.error(), Some("Please select an image or video file"));
    }

    #[test]
    fn begin_without_file_fails() {
        let (mut session, _dir) = session();
        assert_matches!(session.begin(), Err(ProcessError::NoFileSelected));
        assert_eq!(session.state(), &SubmissionState::Failed("Please select a file first".into()));
        assert_eq!(session.error(), Some("Please select a file first"));
    }

    #[test]
    fn second_begin_is_refused_while_processing() {
        let (mut session, _dir) = session();
        session.select_file(Some(png())).unwrap();

        let first = session.begin().unwrap();
        assert!(session.is_processing());
        assert_matches!(session.begin(), Err(ProcessError::AlreadyProcessing));
        assert!(session.is_processing());
        assert!(session.error().is_none());

        session.finish(first, Ok(RawResponse::new(200, Some("image/png"), &b"px"[..])));
        assert_eq!(session.state(), &SubmissionState::Succeeded(MediaKind::Image));
    }

    #[test]
    fn stale_submission_token_is_ignored() {
        let (mut session, _dir) = session();
        session.select_file(Some(mp4())).unwrap();

        let first = session.begin().unwrap();
        let first_id = first.id();
        session.finish(first, Err(TransportError::Other("offline".into())));
        assert_eq!(session.error(), Some("offline"));

        let second = session.begin().unwrap();
        assert_ne!(second.id(), first_id);
        let forged = Submission {
            id: first_id,
            selection: second.selection,
            kind: MediaKind::Video,
            payload: second.payload().clone(),
        };
        session.finish(forged, Ok(ok_video()));
        assert!(session.is_processing());

        session.finish(second, Ok(ok_video()));
        assert_eq!(session.state(), &SubmissionState::Succeeded(MediaKind::Video));
    }

    #[test]
    fn reselecting_during_processing_discards_outcome() {
        let (mut session, _dir) = session();
        session.select_file(Some(mp4())).unwrap();
        let submission = session.begin().unwrap();

        session.select_file(Some(png())).unwrap();
        assert!(session.is_processing());

        session.finish(submission, Ok(ok_video()));
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert!(session.result().is_none());
        assert_eq!(session.kind(), Some(MediaKind::Image));
    }

    #[test]
    fn rejected_selection_during_processing_stays_processing() {
        let (mut session, _dir) = session();
        session.select_file(Some(mp4())).unwrap();
        let submission = session.begin().unwrap();

        let pdf = SourceFile::new("doc.pdf", "application/pdf", vec![1]);
        assert_matches!(session.select_file(Some(pdf)), Err(ProcessError::UnsupportedFileType));
        assert!(session.is_processing());
        assert!(session.file().is_none());
        assert_eq!(session.error(), Some("Please select an image or video file"));

        session.finish(submission, Ok(ok_video()));
        assert_eq!(session.state(), &SubmissionState::Idle);
        assert!(session.result().is_none());
    }

    #[test]
    fn abandoned_submission_frees_the_slot() {
        let (mut session, _dir) = session();
        session.select_file(Some(png())).unwrap();

        let first = session.begin().unwrap();
        assert_eq!(session.abandon(first), &SubmissionState::Idle);
        assert!(!session.is_processing());
        assert!(session.error().is_none());

        let second = session.begin().unwrap();
        session.finish(second, Ok(RawResponse::new(200, Some("image/png"), &b"px"[..])));
        assert_eq!(session.state(), &SubmissionState::Succeeded(MediaKind::Image));
    }

    #[test]
    fn abandoning_a_stale_submission_changes_nothing() {
        let (mut session, _dir) = session();
        session.select_file(Some(png())).unwrap();

        let first = session.begin().unwrap();
        let forged = Submission {
            id: first.id() + 1,
            selection: first.selection,
            kind: first.kind(),
            payload: first.payload().clone(),
        };
        session.abandon(forged);
        assert!(session.is_processing());

        session.abandon(first);
        assert_eq!(session.state(), &SubmissionState::Idle);
    }

    #[test]
    fn materialize_failure_is_a_failed_submission() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("work")).unwrap();
        let mut session = Session::new(Box::new(store));
        session.select_file(Some(png())).unwrap();
        let submission = session.begin().unwrap();

        std::fs::remove_dir_all(dir.path().join("work")).unwrap();
        session.finish(submission, Ok(RawResponse::new(200, Some("image/png"), &b"px"[..])));

        assert_matches!(session.state(), SubmissionState::Failed(msg) if msg.contains("Failed to store image result"));
        assert!(session.result().is_none());
    }

    #[test]
    fn preview_follows_selection() {
        let (mut session, _dir) = session();
        assert!(session.preview().unwrap().is_none());

        session.select_file(Some(png())).unwrap();
        let path = session.preview().unwrap().unwrap().path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        session.select_file(Some(mp4())).unwrap();
        assert!(!path.exists());
    }
}
