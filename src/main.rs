use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use ytgrab::error::Result;
use ytgrab::{client, Config, FfmpegMuxer, MediaRequest, Presenter, YtDlpClient};

/// Main entry point for the application.
///
/// # Steps
/// 1. Initializes logging
/// 2. Creates a default configuration
/// 3. Provisions the extraction backend binaries
/// 4. Runs the interactive session loop
///
/// # Errors
/// Returns error if backend provisioning or client construction fails.
/// Per-action errors are reported and the session continues.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting ytgrab...");

    let config = Arc::new(Config::default());
    let fetcher = Arc::new(client::initialize_backend(&config).await?);
    let yt_client = Arc::new(YtDlpClient::new(config.clone())?);
    let muxer = Arc::new(FfmpegMuxer::new(fetcher, &config));
    let presenter = Presenter::new(yt_client, muxer, config);

    run_session(&presenter).await?;

    info!("Session finished");
    Ok(())
}

/// Reads URLs and selections until the user quits. One URL triggers one
/// synchronous resolve → select → download → (mux) → present chain; a
/// failed action is reported and the loop continues.
async fn run_session(presenter: &Presenter) -> Result<()> {
    loop {
        let url = prompt("YouTube URL (blank to quit): ")?;
        if url.is_empty() {
            break;
        }
        if let Err(e) = run_action(presenter, &url).await {
            error!("Action failed: {e}");
        }
    }
    Ok(())
}

/// Drives a single action for one URL.
async fn run_action(presenter: &Presenter, url: &str) -> Result<()> {
    let source = presenter.resolve(url).await?;

    let mode = prompt("Download type ([v]ideo / [a]udio only): ")?;
    let request = if mode.eq_ignore_ascii_case("a") {
        build_audio_request(presenter, &source)?
    } else {
        build_video_request(presenter, &source)?
    };

    let artifact = presenter.prepare(&source, &request).await?;
    println!("Prepared: {} ({})", artifact.path.display(), artifact.mime);
    println!("Suggested file name: {}", artifact.download_name);
    Ok(())
}

fn build_audio_request(
    presenter: &Presenter,
    source: &ytgrab::MediaSource,
) -> Result<MediaRequest> {
    let bit_rates = presenter.audio_options(source);
    let bit_rate = if bit_rates.is_empty() {
        println!(
            "No adaptive audio streams detected. \
             Audio will be extracted from a progressive stream."
        );
        None
    } else {
        Some(choose("Select audio bit rate", &bit_rates)?)
    };

    Ok(MediaRequest {
        audio_only: true,
        resolution: None,
        bit_rate,
        progressive: false,
    })
}

fn build_video_request(
    presenter: &Presenter,
    source: &ytgrab::MediaSource,
) -> Result<MediaRequest> {
    let adaptive = prompt("Use adaptive streams (separate audio track)? [y/N]: ")?
        .eq_ignore_ascii_case("y");
    let progressive = !adaptive;

    let resolutions = presenter.video_options(source, progressive);
    if resolutions.is_empty() {
        return Err(ytgrab::AppError::StreamNotFound(
            "no video streams for the selected mode".to_string(),
        ));
    }
    let resolution = choose("Select video resolution", &resolutions)?;

    let bit_rate = if adaptive {
        let bit_rates = presenter.audio_options(source);
        if bit_rates.is_empty() {
            println!(
                "No adaptive audio streams detected. \
                 Audio will be extracted from a progressive stream."
            );
            None
        } else {
            Some(choose("Select audio bit rate", &bit_rates)?)
        }
    } else {
        None
    };

    Ok(MediaRequest {
        audio_only: false,
        resolution: Some(resolution),
        bit_rate,
        progressive,
    })
}

/// Prints a prompt and reads one trimmed line from stdin.
fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Numbered selection from a non-empty option list; empty input picks the
/// first (best) option.
fn choose(message: &str, options: &[String]) -> Result<String> {
    println!("{message}:");
    for (i, option) in options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
    loop {
        let answer = prompt("Choice [1]: ")?;
        if answer.is_empty() {
            return Ok(options[0].clone());
        }
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => return Ok(options[n - 1].clone()),
            _ => println!("Enter a number between 1 and {}", options.len()),
        }
    }
}
