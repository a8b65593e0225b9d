use crate::config::Config;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};
use yt_dlp::Youtube;

/// Audio/video muxing.
///
/// Combining re-encodes the video and replaces its audio track; extraction
/// pulls the audio track out of a progressive download for the audio-only
/// fallback. Both operations take filenames relative to the output
/// directory and fail with a reported [`AppError::Muxing`] when an input
/// file is missing.

#[async_trait]
pub trait Muxer: Send + Sync {
    /// Combines `video` and `audio` into `out`, replacing the audio track.
    async fn replace_audio(&self, video: &str, audio: &str, out: &str) -> Result<()>;

    /// Extracts the audio track of `video` into `out`.
    async fn extract_audio(&self, video: &str, out: &str) -> Result<()>;
}

/// Verifies that every input file exists before muxing starts.
pub fn ensure_inputs(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if !path.exists() {
            return Err(AppError::Muxing(format!(
                "Input file missing: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Muxer backed by the extraction backend's bundled ffmpeg.
pub struct FfmpegMuxer {
    fetcher: Arc<Youtube>,
    ffmpeg: PathBuf,
    output_dir: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(fetcher: Arc<Youtube>, config: &Config) -> Self {
        Self {
            fetcher,
            ffmpeg: config.libraries_dir.join("ffmpeg"),
            output_dir: config.output_dir.clone(),
        }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    #[instrument(skip(self))]
    async fn replace_audio(&self, video: &str, audio: &str, out: &str) -> Result<()> {
        ensure_inputs(&[self.path_of(video), self.path_of(audio)])?;

        self.fetcher
            .combine_audio_and_video(audio, video, out)
            .await?;
        debug!("Combined {video} + {audio} into {out}");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn extract_audio(&self, video: &str, out: &str) -> Result<()> {
        let source = self.path_of(video);
        ensure_inputs(std::slice::from_ref(&source))?;
        let dest = self.path_of(out);

        let output = tokio::process::Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(&source)
            .arg("-vn")
            .arg("-c:a")
            .arg("aac")
            .arg(&dest)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Muxing(format!(
                "ffmpeg failed to extract audio: {}",
                stderr.lines().last().unwrap_or("no output").trim()
            )));
        }
        debug!("Extracted audio track of {video} into {out}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_input_is_a_muxing_error() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("video.mp4");
        std::fs::write(&present, b"data").unwrap();
        let missing = dir.path().join("audio.m4a");

        let err = ensure_inputs(&[present.clone(), missing]).unwrap_err();
        assert!(matches!(err, AppError::Muxing(_)));

        assert!(ensure_inputs(&[present]).is_ok());
    }
}
