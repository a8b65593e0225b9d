/// An interactive YouTube fetch and mux tool.
///
/// This library resolves a YouTube URL into its available streams, lets
/// the caller pick a resolution or audio bit rate, downloads the chosen
/// stream(s) and muxes adaptive audio and video into a single file.
/// Stream extraction and container muxing are delegated to the managed
/// yt-dlp/ffmpeg backend.
///
/// # Architecture
///
/// The application is structured into several key components:
/// - `Config`: Paths, fixed intermediate filenames and secrets
/// - `StreamClient` / `YtDlpClient`: URL resolution and stream fetching
/// - `selector`: Pure stream filtering, sorting and fallback selection
/// - `Downloader`: The sequential download/mux chain for one job
/// - `Muxer` / `FfmpegMuxer`: Audio replacement and extraction
/// - `Presenter`: Drives one user action and derives the artifact name
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ytgrab::{client, Config, FfmpegMuxer, Presenter, YtDlpClient};
///
/// async fn example() -> ytgrab::Result<()> {
///     let config = Arc::new(Config::default());
///     let fetcher = Arc::new(client::initialize_backend(&config).await?);
///     let yt = Arc::new(YtDlpClient::new(config.clone())?);
///     let muxer = Arc::new(FfmpegMuxer::new(fetcher, &config));
///     let presenter = Presenter::new(yt, muxer, config);
///     let source = presenter.resolve("https://youtu.be/dQw4w9WgXcQ").await?;
///     println!("{}", source.title);
///     Ok(())
/// }
/// ```
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod media;
pub mod muxer;
pub mod presenter;
pub mod progress;
pub mod selector;
pub mod verify;

// Re-export commonly used items
pub use client::{StreamClient, YtDlpClient};
pub use config::{Config, Secrets};
pub use downloader::{Downloader, MediaRequest, PreparedMedia};
pub use error::{AppError, Result};
pub use media::{MediaSource, StreamDescriptor, StreamKind, TokenPair, Verification};
pub use muxer::{FfmpegMuxer, Muxer};
pub use presenter::{Artifact, Presenter};
pub use progress::StageProgress;
