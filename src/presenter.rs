use crate::client::StreamClient;
use crate::config::Config;
use crate::downloader::{Downloader, MediaRequest};
use crate::error::Result;
use crate::media::MediaSource;
use crate::muxer::Muxer;
use crate::progress::StageProgress;
use crate::selector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Failure report file under the output directory.
const FAILURE_REPORT: &str = "failed.txt";

/// The final downloadable artifact of one action.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub download_name: String,
    pub mime: &'static str,
}

/// Drives one user action end to end.
///
/// Sequence per action: resolve the URL, enumerate selectable qualities,
/// run the download/mux chain, derive the artifact name. Errors terminate
/// the action, never the session; failed actions are appended to the
/// failure report.
pub struct Presenter {
    client: Arc<dyn StreamClient>,
    downloader: Downloader,
    config: Arc<Config>,
}

impl Presenter {
    pub fn new(
        client: Arc<dyn StreamClient>,
        muxer: Arc<dyn Muxer>,
        config: Arc<Config>,
    ) -> Self {
        let downloader = Downloader::new(client.clone(), muxer, config.clone());
        Self {
            client,
            downloader,
            config,
        }
    }

    /// Resolves the URL and echoes the source metadata.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> Result<MediaSource> {
        let source = self.client.resolve(url).await?;

        info!("Title: {}", source.title);
        if let Some(date) = source.publish_date {
            info!("Publish date: {date}");
        }
        info!("Duration: {}", source.length_display());
        info!("Views: {}", source.views);
        Ok(source)
    }

    /// Selectable resolutions for the requested mode.
    pub fn video_options(&self, source: &MediaSource, progressive: bool) -> Vec<String> {
        selector::resolutions(source, progressive)
    }

    /// Selectable audio bit rates, restricted to what is fetchable with
    /// the current verification state.
    pub fn audio_options(&self, source: &MediaSource) -> Vec<String> {
        selector::bit_rates(source, self.client.token_present())
    }

    /// Runs the prepare chain and returns the artifact. Failures are
    /// recorded in the failure report before being returned.
    pub async fn prepare(&self, source: &MediaSource, request: &MediaRequest) -> Result<Artifact> {
        let mut progress = StageProgress::new();

        let prepared = match self.downloader.prepare(source, request).await {
            Ok(prepared) => prepared,
            Err(e) => {
                progress.record_failure(&source.url, e.to_string());
                let report = self.config.output_dir.join(FAILURE_REPORT);
                if let Err(io_err) = progress.export_failures(&report) {
                    error!("Failed to export failure report: {io_err}");
                }
                return Err(e);
            }
        };
        progress.stage_completed("prepare");

        let download_name = derived_name(
            &prepared.title,
            selection_suffix(request).as_deref(),
            &prepared.file_name,
        );
        info!(
            "Prepared {download_name} in {:.1}s total",
            progress.total_secs()
        );

        Ok(Artifact {
            path: self.config.output_dir.join(&prepared.file_name),
            download_name,
            mime: prepared.mime,
        })
    }
}

/// Selection suffix of the derived artifact name: the resolution for
/// video jobs, the bit rate for audio-only jobs.
fn selection_suffix(request: &MediaRequest) -> Option<String> {
    if request.audio_only {
        request.bit_rate.clone()
    } else {
        request.resolution.clone()
    }
}

/// Derives the user-facing artifact name: `{Title} {suffix}.{extension}`.
/// The extension comes from the intermediate filename, defaulting to mp4.
fn derived_name(title: &str, suffix: Option<&str>, file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    match suffix {
        Some(suffix) => format!("{title} {suffix}.{extension}"),
        None => format!("{title}.{extension}"),
    }
}
