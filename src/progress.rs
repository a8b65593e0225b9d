use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Progress tracking and reporting functionality.
///
/// One tracker lives for one user action. It records the elapsed time of
/// each stage of the resolve → select → download → mux chain and keeps
/// failed actions for the failure report file.

/// Tracks per-stage timing and failures for a single prepare action.
///
/// # Examples
///
/// ```
/// use ytgrab::StageProgress;
///
/// let mut progress = StageProgress::new();
/// progress.stage_completed("resolve");
/// ```
pub struct StageProgress {
    started: Instant,
    last_stage: Instant,
    stages: Vec<(String, f64)>,
    failures: Vec<(String, String)>, // (URL, error message)
}

impl StageProgress {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_stage: now,
            stages: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Records the completion of a named stage and logs its duration.
    pub fn stage_completed(&mut self, name: &str) {
        let elapsed = self.last_stage.elapsed().as_secs_f64();
        self.last_stage = Instant::now();
        self.stages.push((name.to_string(), elapsed));
        info!("Stage {name} completed in {elapsed:.1}s");
    }

    /// Total elapsed time since the action started.
    pub fn total_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn record_failure(&mut self, url: &str, error: String) {
        self.failures.push((url.to_string(), error));
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Appends failed action details to the failure report file.
    pub fn export_failures(&self, path: &Path) -> std::io::Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = std::io::BufWriter::new(file);

        writeln!(
            writer,
            "\n=== Failed Actions Report {} ===",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        for (url, error) in &self.failures {
            writeln!(writer, "URL: {}", url)?;
            writeln!(writer, "Error: {}", error)?;
            writeln!(writer, "---")?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for StageProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_stages_in_order() {
        let mut progress = StageProgress::new();
        progress.stage_completed("resolve");
        progress.stage_completed("download");
        let names: Vec<&str> = progress.stages.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["resolve", "download"]);
    }

    #[test]
    fn exports_failures_to_report_file() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("failed.txt");

        let mut progress = StageProgress::new();
        progress.record_failure("https://youtu.be/abc", "Stream not found".to_string());
        progress.export_failures(&report).unwrap();

        let content = std::fs::read_to_string(&report).unwrap();
        assert!(content.contains("https://youtu.be/abc"));
        assert!(content.contains("Stream not found"));
    }

    #[test]
    fn empty_report_writes_nothing() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("failed.txt");

        let progress = StageProgress::new();
        progress.export_failures(&report).unwrap();
        assert!(!report.exists());
    }
}
