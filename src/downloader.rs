use crate::client::StreamClient;
use crate::config::{Config, AUDIO_MIME, VIDEO_MIME};
use crate::error::{AppError, Result};
use crate::media::{DownloadJob, JobState, MediaSource, StreamDescriptor};
use crate::muxer::Muxer;
use crate::selector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Muxed output is written next to the intermediates, then renamed onto
/// the video filename.
const MUXED_NAME: &str = "combined.mp4";

/// What the user asked for: one video job or one audio-only job.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub audio_only: bool,
    pub resolution: Option<String>,
    pub bit_rate: Option<String>,
    pub progressive: bool,
}

/// A finished artifact ready to be presented.
#[derive(Debug, Clone)]
pub struct PreparedMedia {
    pub title: String,
    pub file_name: String,
    pub mime: &'static str,
}

/// Runs download jobs for one resolved source.
///
/// Every request is a sequential chain: select the stream(s), download to
/// the fixed intermediate paths, mux when video and audio arrived
/// separately. Exactly one video stream and at most one audio stream are
/// selected per job.
///
/// # Fields
/// * `client` - Stream resolution and fetching backend
/// * `muxer` - Audio/video combination and extraction backend
/// * `config` - Paths and fixed intermediate filenames
pub struct Downloader {
    client: Arc<dyn StreamClient>,
    muxer: Arc<dyn Muxer>,
    config: Arc<Config>,
}

impl Downloader {
    pub fn new(client: Arc<dyn StreamClient>, muxer: Arc<dyn Muxer>, config: Arc<Config>) -> Self {
        Self {
            client,
            muxer,
            config,
        }
    }

    /// Prepares the requested media and returns the artifact description.
    #[instrument(skip(self, source), fields(title = %source.title))]
    pub async fn prepare(
        &self,
        source: &MediaSource,
        request: &MediaRequest,
    ) -> Result<PreparedMedia> {
        if request.audio_only {
            self.download_audio(source, request.bit_rate.as_deref())
                .await?;
            return Ok(PreparedMedia {
                title: source.title.clone(),
                file_name: self.config.audio_filename.clone(),
                mime: AUDIO_MIME,
            });
        }

        let resolution = request.resolution.as_deref().ok_or_else(|| {
            AppError::StreamNotFound("no resolution selected".to_string())
        })?;
        let video = selector::select_video(source, resolution, request.progressive)
            .ok_or_else(|| {
                AppError::StreamNotFound(format!(
                    "no video stream for the selected resolution {resolution}"
                ))
            })?
            .clone();

        self.run_job(source, video, self.config.video_path()).await?;

        if !request.progressive {
            self.download_audio(source, request.bit_rate.as_deref())
                .await?;
            self.mux().await?;
        }

        Ok(PreparedMedia {
            title: source.title.clone(),
            file_name: self.config.video_filename.clone(),
            mime: VIDEO_MIME,
        })
    }

    /// Combines the downloaded video and audio intermediates, replacing
    /// the video's audio track, and moves the result onto the video path.
    async fn mux(&self) -> Result<()> {
        self.muxer
            .replace_audio(
                &self.config.video_filename,
                &self.config.audio_filename,
                MUXED_NAME,
            )
            .await?;
        tokio::fs::rename(
            self.config.output_dir.join(MUXED_NAME),
            self.config.video_path(),
        )
        .await?;
        Ok(())
    }

    /// Downloads the audio track for a job.
    ///
    /// With no selected bit rate the progressive-extraction path is used
    /// directly. A selected bit rate is matched exactly; when no usable
    /// stream exists or the remote service rejects the stream and no
    /// verification token is present, the progressive path is retried
    /// once before the failure is reported.
    async fn download_audio(&self, source: &MediaSource, bit_rate: Option<&str>) -> Result<()> {
        let token_present = self.client.token_present();

        let Some(bit_rate) = bit_rate else {
            return self.audio_via_progressive(source).await;
        };

        match selector::select_audio(source, bit_rate, token_present) {
            Some(stream) => {
                let stream = stream.clone();
                match self.run_job(source, stream, self.config.audio_path()).await {
                    Ok(()) => Ok(()),
                    Err(AppError::RemoteRejection(msg)) if !token_present => {
                        warn!(
                            "Remote service rejected the audio stream ({msg}), \
                             retrying via progressive extraction"
                        );
                        self.audio_via_progressive(source).await
                    }
                    Err(e) => Err(e),
                }
            }
            None if !token_present => {
                info!("No usable audio stream at {bit_rate} without a verification token");
                self.audio_via_progressive(source).await
            }
            None => Err(AppError::StreamNotFound(format!(
                "no audio stream for the selected bit rate {bit_rate}"
            ))),
        }
    }

    /// Fallback: download the best progressive stream and extract its
    /// audio track. The temporary source file is removed afterwards.
    async fn audio_via_progressive(&self, source: &MediaSource) -> Result<()> {
        let stream = selector::best_progressive(source)
            .ok_or_else(|| {
                AppError::StreamNotFound(
                    "no progressive stream available for audio extraction".to_string(),
                )
            })?
            .clone();

        info!(
            "Extracting audio from a progressive stream; \
             provide a verification token for direct audio downloads"
        );
        self.run_job(source, stream, self.config.audio_source_path())
            .await?;
        self.muxer
            .extract_audio(
                &self.config.audio_source_filename,
                &self.config.audio_filename,
            )
            .await?;

        if let Err(e) = tokio::fs::remove_file(self.config.audio_source_path()).await {
            warn!("Could not delete temporary progressive source: {e}");
        }
        Ok(())
    }

    /// Runs a single [`DownloadJob`] and tracks its completion state.
    async fn run_job(
        &self,
        source: &MediaSource,
        stream: StreamDescriptor,
        dest: PathBuf,
    ) -> Result<()> {
        let mut job = DownloadJob::new(stream, dest);
        info!(
            "Downloading {} stream ({}) to {}",
            job.stream.label,
            job.stream.mime_type,
            job.dest.display()
        );

        match self.client.fetch_stream(source, &job.stream, &job.dest).await {
            Ok(()) => {
                job.mark(JobState::Succeeded);
                Ok(())
            }
            Err(e) => {
                job.mark(JobState::Failed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamKind;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeClient {
        token_present: bool,
        reject_ids: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new(token_present: bool) -> Self {
            Self {
                token_present,
                reject_ids: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn rejecting(token_present: bool, ids: &[&str]) -> Self {
            Self {
                token_present,
                reject_ids: ids.iter().map(|s| s.to_string()).collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched_ids(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StreamClient for FakeClient {
        async fn resolve(&self, _url: &str) -> Result<MediaSource> {
            Err(AppError::Custom("not used in tests".to_string()))
        }

        async fn fetch_stream(
            &self,
            _source: &MediaSource,
            stream: &StreamDescriptor,
            dest: &Path,
        ) -> Result<()> {
            self.fetched.lock().unwrap().push(stream.id.clone());
            if self.reject_ids.contains(&stream.id) {
                return Err(AppError::RemoteRejection("simulated rejection".to_string()));
            }
            tokio::fs::write(dest, b"stream bytes").await?;
            Ok(())
        }

        fn token_present(&self) -> bool {
            self.token_present
        }
    }

    struct FakeMuxer {
        output_dir: PathBuf,
        combined: AtomicUsize,
        extracted: AtomicUsize,
    }

    impl FakeMuxer {
        fn new(output_dir: PathBuf) -> Self {
            Self {
                output_dir,
                combined: AtomicUsize::new(0),
                extracted: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Muxer for FakeMuxer {
        async fn replace_audio(&self, _video: &str, _audio: &str, out: &str) -> Result<()> {
            self.combined.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(self.output_dir.join(out), b"muxed").await?;
            Ok(())
        }

        async fn extract_audio(&self, _video: &str, out: &str) -> Result<()> {
            self.extracted.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(self.output_dir.join(out), b"audio").await?;
            Ok(())
        }
    }

    struct FailingMuxer;

    #[async_trait]
    impl Muxer for FailingMuxer {
        async fn replace_audio(&self, _video: &str, _audio: &str, _out: &str) -> Result<()> {
            Err(AppError::Muxing("input file missing".to_string()))
        }

        async fn extract_audio(&self, _video: &str, _out: &str) -> Result<()> {
            Err(AppError::Muxing("input file missing".to_string()))
        }
    }

    fn video(id: &str, label: &str, progressive: bool) -> StreamDescriptor {
        StreamDescriptor {
            id: id.into(),
            kind: StreamKind::Video,
            label: label.into(),
            progressive,
            mime_type: "video/mp4".into(),
            requires_token: false,
        }
    }

    fn audio(id: &str, label: &str) -> StreamDescriptor {
        StreamDescriptor {
            id: id.into(),
            kind: StreamKind::Audio,
            label: label.into(),
            progressive: false,
            mime_type: "audio/mp4".into(),
            requires_token: false,
        }
    }

    fn source(streams: Vec<StreamDescriptor>) -> MediaSource {
        MediaSource {
            url: "https://www.youtube.com/watch?v=abc123".into(),
            id: "abc123".into(),
            title: "Test Video".into(),
            length_secs: 120,
            views: 42,
            publish_date: None,
            streams,
        }
    }

    fn setup(
        client: FakeClient,
    ) -> (TempDir, Arc<FakeClient>, Arc<FakeMuxer>, Downloader) {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(Config {
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let client = Arc::new(client);
        let muxer = Arc::new(FakeMuxer::new(config.output_dir.clone()));
        let downloader = Downloader::new(client.clone(), muxer.clone(), config);
        (dir, client, muxer, downloader)
    }

    fn video_request(resolution: &str, progressive: bool, bit_rate: Option<&str>) -> MediaRequest {
        MediaRequest {
            audio_only: false,
            resolution: Some(resolution.to_string()),
            bit_rate: bit_rate.map(|b| b.to_string()),
            progressive,
        }
    }

    fn audio_request(bit_rate: Option<&str>) -> MediaRequest {
        MediaRequest {
            audio_only: true,
            resolution: None,
            bit_rate: bit_rate.map(|b| b.to_string()),
            progressive: false,
        }
    }

    #[tokio::test]
    async fn progressive_selection_downloads_once_without_muxing() {
        let (_dir, client, muxer, downloader) = setup(FakeClient::new(true));
        let source = source(vec![video("22", "1080p", true)]);

        let prepared = downloader
            .prepare(&source, &video_request("1080p", true, None))
            .await
            .unwrap();

        assert_eq!(client.fetched_ids(), vec!["22"]);
        assert_eq!(muxer.combined.load(Ordering::SeqCst), 0);
        assert_eq!(prepared.mime, VIDEO_MIME);
        assert_eq!(prepared.file_name, "video.mp4");
    }

    #[tokio::test]
    async fn adaptive_selection_downloads_both_and_muxes_once() {
        let (_dir, client, muxer, downloader) = setup(FakeClient::new(true));
        let source = source(vec![video("137", "720p", false), audio("140", "128kbps")]);

        let prepared = downloader
            .prepare(&source, &video_request("720p", false, Some("128kbps")))
            .await
            .unwrap();

        assert_eq!(client.fetched_ids(), vec!["137", "140"]);
        assert_eq!(muxer.combined.load(Ordering::SeqCst), 1);
        assert_eq!(prepared.mime, VIDEO_MIME);
    }

    #[tokio::test]
    async fn audio_only_without_adaptive_audio_extracts_from_progressive() {
        let (dir, client, muxer, downloader) = setup(FakeClient::new(false));
        let source = source(vec![video("22", "720p", true)]);

        let prepared = downloader
            .prepare(&source, &audio_request(None))
            .await
            .unwrap();

        assert_eq!(client.fetched_ids(), vec!["22"]);
        assert_eq!(muxer.extracted.load(Ordering::SeqCst), 1);
        assert_eq!(prepared.mime, AUDIO_MIME);
        // Temporary progressive source is cleaned up.
        assert!(!dir.path().join("audio_source.mp4").exists());
    }

    #[tokio::test]
    async fn missing_bit_rate_without_token_retries_progressive() {
        let (_dir, client, muxer, downloader) = setup(FakeClient::new(false));
        let source = source(vec![video("22", "720p", true)]);

        downloader
            .prepare(&source, &audio_request(Some("96kbps")))
            .await
            .unwrap();

        assert_eq!(client.fetched_ids(), vec!["22"]);
        assert_eq!(muxer.extracted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_bit_rate_with_token_is_stream_not_found() {
        let (_dir, _client, _muxer, downloader) = setup(FakeClient::new(true));
        let source = source(vec![video("22", "720p", true)]);

        let err = downloader
            .prepare(&source, &audio_request(Some("96kbps")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StreamNotFound(_)));
    }

    #[tokio::test]
    async fn remote_rejection_without_token_falls_back_once() {
        let (_dir, client, muxer, downloader) =
            setup(FakeClient::rejecting(false, &["140"]));
        let source = source(vec![video("22", "720p", true), audio("140", "128kbps")]);

        downloader
            .prepare(&source, &audio_request(Some("128kbps")))
            .await
            .unwrap();

        // Rejected adaptive fetch first, then exactly one progressive retry.
        assert_eq!(client.fetched_ids(), vec!["140", "22"]);
        assert_eq!(muxer.extracted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_rejection_with_token_is_reported() {
        let (_dir, client, _muxer, downloader) =
            setup(FakeClient::rejecting(true, &["140"]));
        let source = source(vec![video("22", "720p", true), audio("140", "128kbps")]);

        let err = downloader
            .prepare(&source, &audio_request(Some("128kbps")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RemoteRejection(_)));
        assert_eq!(client.fetched_ids(), vec!["140"]);
    }

    #[tokio::test]
    async fn unknown_resolution_is_stream_not_found() {
        let (_dir, _client, _muxer, downloader) = setup(FakeClient::new(true));
        let source = source(vec![video("22", "720p", true)]);

        let err = downloader
            .prepare(&source, &video_request("1080p", true, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StreamNotFound(_)));
    }

    #[tokio::test]
    async fn muxing_failure_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(Config {
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let client = Arc::new(FakeClient::new(true));
        let downloader = Downloader::new(client, Arc::new(FailingMuxer), config);
        let source = source(vec![video("137", "720p", false), audio("140", "128kbps")]);

        let err = downloader
            .prepare(&source, &video_request("720p", false, Some("128kbps")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Muxing(_)));
    }
}
