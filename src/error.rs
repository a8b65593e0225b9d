use std::io;
use thiserror::Error;
use url;

/// Error types for the application.
///
/// Every error is surfaced to the user as a terminal message for the
/// current action; none of them abort the interactive session.

/// Represents all possible errors that can occur in the application.
///
/// # Error Categories
///
/// - UnavailableSource: bad URL, removed or blocked video
/// - Verification: verification token could not be obtained
/// - StreamNotFound: the selected resolution/bit rate has no stream
/// - RemoteRejection: the remote service refused to serve a stream
/// - Muxing: combining or extracting audio failed
/// - Io / Request / UrlParse / Json / Youtube: ambient failures from the
///   filesystem, HTTP client, URL parser, metadata parser and the
///   extraction backend
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Source unavailable: {0}")]
    UnavailableSource(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Stream rejected by remote service: {0}")]
    RemoteRejection(String),

    #[error("Muxing error: {0}")]
    Muxing(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Youtube error: {0}")]
    Youtube(#[from] yt_dlp::error::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Metadata parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::Custom(error.to_string())
    }
}

impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::Custom(error)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
