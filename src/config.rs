use serde::Deserialize;
use std::path::PathBuf;

/// Configuration management for the application.
///
/// Provides centralized configuration options for controlling:
/// - Directory paths for output and extraction binaries
/// - Fixed intermediate filenames
/// - Optional verification secrets and token provider endpoint
/// - Network timeouts

/// MIME type of prepared video artifacts.
pub const VIDEO_MIME: &str = "video/mp4";

/// MIME type of prepared audio artifacts.
pub const AUDIO_MIME: &str = "audio/mp4";

/// A configured verification token pair: the visitor identifier plus the
/// proof-of-origin token used to access restricted streams.
#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub visitor_id: String,
    pub po_token: String,
}

/// Configuration for the media downloader application.
///
/// Intermediate filenames are fixed: one downloaded video, one downloaded
/// (or extracted) audio, and one progressive source used for audio
/// extraction. Jobs sharing the output directory therefore serialize on
/// these paths.
///
/// # Examples
///
/// ```
/// use ytgrab::Config;
///
/// let config = Config::default();
/// assert!(config.http_timeout_secs > 0);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub output_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub video_filename: String,
    pub audio_filename: String,
    pub audio_source_filename: String,
    pub http_timeout_secs: u64,
    pub secrets: Option<Secrets>,
    pub token_provider: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            libraries_dir: PathBuf::from("libs"),
            video_filename: String::from("video.mp4"),
            audio_filename: String::from("audio.m4a"),
            audio_source_filename: String::from("audio_source.mp4"),
            http_timeout_secs: 30,
            secrets: None,
            token_provider: None,
        }
    }
}

impl Config {
    /// Full path of the downloaded video intermediate.
    pub fn video_path(&self) -> PathBuf {
        self.output_dir.join(&self.video_filename)
    }

    /// Full path of the downloaded or extracted audio intermediate.
    pub fn audio_path(&self) -> PathBuf {
        self.output_dir.join(&self.audio_filename)
    }

    /// Full path of the progressive source used for audio extraction.
    pub fn audio_source_path(&self) -> PathBuf {
        self.output_dir.join(&self.audio_source_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_fixed_intermediate_names() {
        let config = Config::default();
        assert_eq!(config.video_path(), PathBuf::from("output/video.mp4"));
        assert_eq!(config.audio_path(), PathBuf::from("output/audio.m4a"));
        assert_eq!(
            config.audio_source_path(),
            PathBuf::from("output/audio_source.mp4")
        );
        assert!(config.secrets.is_none());
    }

    #[test]
    fn deserializes_secrets_as_named_fields() {
        let raw = r#"{
            "output_dir": "out",
            "libraries_dir": "libs",
            "video_filename": "video.mp4",
            "audio_filename": "audio.m4a",
            "audio_source_filename": "audio_source.mp4",
            "http_timeout_secs": 10,
            "secrets": { "visitor_id": "abc", "po_token": "xyz" },
            "token_provider": null
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        let secrets = config.secrets.unwrap();
        assert_eq!(secrets.visitor_id, "abc");
        assert_eq!(secrets.po_token, "xyz");
    }
}
