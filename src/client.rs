use crate::config::Config;
use crate::error::{AppError, Result};
use crate::media::{MediaSource, StreamDescriptor, StreamKind, Verification};
use crate::verify;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;
use yt_dlp::fetcher::deps::Libraries;
use yt_dlp::Youtube;

/// Stream resolution and fetching.
///
/// The [`StreamClient`] trait is the seam between the orchestration and
/// the extraction backend, so the downloader can be exercised without
/// network access. The real implementation drives the managed yt-dlp
/// binary: `--dump-json` for metadata, `-f <id>` for stream fetches.

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Resolves a URL into a [`MediaSource`] or a terminal user-facing error.
    async fn resolve(&self, url: &str) -> Result<MediaSource>;

    /// Fetches one stream of `source` to `dest`.
    async fn fetch_stream(
        &self,
        source: &MediaSource,
        stream: &StreamDescriptor,
        dest: &Path,
    ) -> Result<()>;

    /// Whether a verification token accompanied the last resolution.
    fn token_present(&self) -> bool;
}

/// Provisions the extraction backend binaries (yt-dlp and ffmpeg).
///
/// Checks for existing binaries under the libraries directory. If not
/// found, downloads new ones. Otherwise reuses them and updates the
/// downloader.
pub async fn initialize_backend(config: &Config) -> Result<Youtube> {
    for dir in [&config.output_dir, &config.libraries_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }

    if !config.libraries_dir.join("yt-dlp").exists()
        || !config.libraries_dir.join("ffmpeg").exists()
    {
        let youtube =
            Youtube::with_new_binaries(config.libraries_dir.clone(), config.output_dir.clone())
                .await?;
        return Ok(youtube);
    }

    let yt_dlp = config.libraries_dir.join("yt-dlp");
    let ffmpeg = config.libraries_dir.join("ffmpeg");
    let libraries = Libraries::new(yt_dlp, ffmpeg);
    let youtube = Youtube::new(libraries, config.output_dir.clone())?;
    youtube.update_downloader().await?;

    Ok(youtube)
}

/// Real client backed by the managed yt-dlp binary.
pub struct YtDlpClient {
    config: Arc<Config>,
    ytdlp: PathBuf,
    http: reqwest::Client,
    verification: RwLock<Verification>,
}

impl YtDlpClient {
    /// Creates the client. TLS trust and timeouts are explicit per-client
    /// configuration, not process-global state.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let ytdlp = config.libraries_dir.join("yt-dlp");

        Ok(Self {
            config,
            ytdlp,
            http,
            verification: RwLock::new(Verification::Unavailable),
        })
    }

    fn extractor_args(&self) -> String {
        let verification = self.verification.read().unwrap();
        match verification.token() {
            Some(pair) => format!(
                "youtube:player_client=web;po_token=web.gvs+{};visitor_data={}",
                pair.po_token, pair.visitor_id
            ),
            None => "youtube:player_client=android_vr".to_string(),
        }
    }

    async fn run_ytdlp(&self, args: &[String]) -> Result<std::process::Output> {
        debug!("Running yt-dlp with args: {:?}", args);
        let output = tokio::process::Command::new(&self.ytdlp)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }
}

#[async_trait]
impl StreamClient for YtDlpClient {
    #[instrument(skip(self))]
    async fn resolve(&self, url: &str) -> Result<MediaSource> {
        let video_id = extract_video_id(url)?;

        let verification = verify::resolve(&self.http, &self.config, &video_id).await;
        if !verification.is_available() {
            warn!("No verification token available, using the degraded extraction client");
        }
        *self.verification.write().unwrap() = verification;

        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--extractor-args".to_string(),
            self.extractor_args(),
            url.to_string(),
        ];
        let output = self.run_ytdlp(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_resolve_error(&stderr));
        }

        let source = parse_metadata(&output.stdout, url)?;
        info!(
            "Resolved \"{}\" with {} streams",
            source.title,
            source.streams.len()
        );
        Ok(source)
    }

    #[instrument(skip(self, source))]
    async fn fetch_stream(
        &self,
        source: &MediaSource,
        stream: &StreamDescriptor,
        dest: &Path,
    ) -> Result<()> {
        let args = vec![
            "-f".to_string(),
            stream.id.clone(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--force-overwrites".to_string(),
            "--extractor-args".to_string(),
            self.extractor_args(),
            "-o".to_string(),
            dest.to_string_lossy().into_owned(),
            source.url.clone(),
        ];
        let output = self.run_ytdlp(&args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_fetch_error(&stderr));
        }
        Ok(())
    }

    fn token_present(&self) -> bool {
        self.verification.read().unwrap().is_available()
    }
}

/// Extracts the video identifier from a watch, share or shorts URL.
pub fn extract_video_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let host = parsed.host_str().unwrap_or_default();

    if host.ends_with("youtu.be") {
        if let Some(id) = parsed.path_segments().and_then(|mut s| s.next()) {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
    } else if host.ends_with("youtube.com") {
        if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "v") {
            return Ok(id.into_owned());
        }
        let mut segments = parsed.path_segments().into_iter().flatten();
        if segments.next() == Some("shorts") {
            if let Some(id) = segments.next() {
                return Ok(id.to_string());
            }
        }
    }

    Err(AppError::UnavailableSource(format!(
        "No video id found in URL: {url}"
    )))
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: String,
    title: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

fn has_codec(codec: &Option<String>) -> bool {
    codec.as_deref().map_or(false, |c| c != "none" && !c.is_empty())
}

fn descriptor_from_format(format: &RawFormat) -> Option<StreamDescriptor> {
    let ext = format.ext.as_deref().unwrap_or("mp4");
    let requires_token = format.protocol.as_deref() == Some("sabr");

    if has_codec(&format.vcodec) {
        let height = match format.height {
            Some(h) => h,
            None => {
                debug!("Skipping video format {} without height", format.format_id);
                return None;
            }
        };
        return Some(StreamDescriptor {
            id: format.format_id.clone(),
            kind: StreamKind::Video,
            label: format!("{height}p"),
            progressive: has_codec(&format.acodec),
            mime_type: format!("video/{ext}"),
            requires_token,
        });
    }

    if has_codec(&format.acodec) {
        let abr = match format.abr {
            Some(a) if a > 0.0 => a,
            _ => {
                debug!("Skipping audio format {} without bit rate", format.format_id);
                return None;
            }
        };
        let mime = match ext {
            "m4a" | "mp4" => "audio/mp4".to_string(),
            other => format!("audio/{other}"),
        };
        return Some(StreamDescriptor {
            id: format.format_id.clone(),
            kind: StreamKind::Audio,
            label: format!("{}kbps", abr.round() as u64),
            progressive: false,
            mime_type: mime,
            requires_token,
        });
    }

    None
}

/// Parses yt-dlp `--dump-json` output into a [`MediaSource`].
pub fn parse_metadata(raw: &[u8], url: &str) -> Result<MediaSource> {
    let video: RawVideo = serde_json::from_slice(raw)?;
    let streams = video
        .formats
        .iter()
        .filter_map(descriptor_from_format)
        .collect();

    Ok(MediaSource {
        url: url.to_string(),
        id: video.id,
        title: video.title,
        length_secs: video.duration.unwrap_or(0.0).round() as u64,
        views: video.view_count.unwrap_or(0),
        publish_date: video
            .upload_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok()),
        streams,
    })
}

fn classify_resolve_error(stderr: &str) -> AppError {
    let message = last_error_line(stderr);
    let unavailable = [
        "Video unavailable",
        "Private video",
        "not a valid URL",
        "Unsupported URL",
        "Sign in to confirm",
        "This video has been removed",
    ];
    if unavailable.iter().any(|m| stderr.contains(m)) {
        AppError::UnavailableSource(message)
    } else {
        AppError::Custom(message)
    }
}

fn classify_fetch_error(stderr: &str) -> AppError {
    let message = last_error_line(stderr);
    let rejected = ["403", "Forbidden", "PO token", "po_token", "SABR"];
    if rejected.iter().any(|m| stderr.contains(m)) {
        AppError::RemoteRejection(message)
    } else {
        AppError::Custom(message)
    }
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("yt-dlp failed without output")
        .trim()
        .to_string()
}
