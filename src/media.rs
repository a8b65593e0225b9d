use chrono::NaiveDate;
use std::path::PathBuf;

/// Data model for one user interaction.
///
/// A `MediaSource` is resolved once per URL and owns its stream list for
/// the duration of the interaction; `DownloadJob`s are created and
/// destroyed within a single request.

/// Whether a stream carries video or audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// One downloadable stream of a resolved source.
///
/// `label` is the user-visible quality label: a resolution such as
/// `"1080p"` for video, a bit rate such as `"128kbps"` for audio.
/// `requires_token` marks streams the remote service only serves when a
/// verification token accompanies the request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub id: String,
    pub kind: StreamKind,
    pub label: String,
    pub progressive: bool,
    pub mime_type: String,
    pub requires_token: bool,
}

/// A resolved media source: metadata plus the ordered stream list.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub url: String,
    pub id: String,
    pub title: String,
    pub length_secs: u64,
    pub views: u64,
    pub publish_date: Option<NaiveDate>,
    pub streams: Vec<StreamDescriptor>,
}

impl MediaSource {
    /// Human-readable duration, `H:MM:SS`.
    pub fn length_display(&self) -> String {
        let hours = self.length_secs / 3600;
        let minutes = (self.length_secs % 3600) / 60;
        let seconds = self.length_secs % 60;
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Completion state of a single download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
}

/// One stream scheduled for download to a destination path.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub stream: StreamDescriptor,
    pub dest: PathBuf,
    state: JobState,
}

impl DownloadJob {
    pub fn new(stream: StreamDescriptor, dest: PathBuf) -> Self {
        Self {
            stream,
            dest,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn mark(&mut self, state: JobState) {
        self.state = state;
    }
}

/// The visitor identifier and proof-of-origin token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub visitor_id: String,
    pub po_token: String,
}

/// Outcome of verification token resolution.
///
/// Carries either a usable token pair or an explicit marker that the
/// resolver must continue in degraded mode.
#[derive(Debug, Clone)]
pub enum Verification {
    Token(TokenPair),
    Unavailable,
}

impl Verification {
    pub fn token(&self) -> Option<&TokenPair> {
        match self {
            Verification::Token(pair) => Some(pair),
            Verification::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.token().is_some()
    }
}
