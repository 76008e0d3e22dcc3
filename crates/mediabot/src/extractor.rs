use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use crate::config::BotConfig;
use crate::process::run_with_deadline;

/// Whole-process deadline for a probe, as a multiple of the socket timeout
const PROBE_DEADLINE_FACTOR: u64 = 6;

/// Deadline for the whole probe process given its socket timeout
pub fn probe_deadline(probe_timeout_secs: u64) -> Duration {
    Duration::from_secs(probe_timeout_secs.max(1) * PROBE_DEADLINE_FACTOR)
}

/// Metadata returned by a probe; only the fields the bot reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub extractor: Option<String>,
}

/// Failure of an extractor call
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The extractor ran and rejected the URL; the text is its own explanation
    #[error("extraction failed: {0}")]
    Extraction(String),
    /// Anything else: spawn failures, deadlines, unreadable output
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything needed to fetch the media for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Format-selection expression
    pub format: String,
    /// Output template; every file written must match it
    pub output_template: String,
    /// Abort downloads larger than this many bytes
    pub max_filesize: u64,
    pub write_thumbnail: bool,
}

/// Resolves web URLs into downloadable media
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Metadata-only lookup, nothing is downloaded
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError>;

    /// Download the media and thumbnail into files matching the request's template
    async fn download(&self, request: &DownloadRequest) -> Result<(), ExtractorError>;
}

/// yt-dlp driven as a subprocess
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
    cookies_file: PathBuf,
    ffmpeg_location: Option<PathBuf>,
    probe_timeout_secs: u64,
    download_timeout: Option<Duration>,
}

impl YtDlp {
    pub fn from_config(cfg: &BotConfig) -> Self {
        // A bare program name is looked up on PATH by yt-dlp itself
        let ffmpeg_location = cfg
            .ffmpeg_bin
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|_| cfg.ffmpeg_bin.clone());

        YtDlp {
            bin: cfg.ytdlp_bin.clone(),
            cookies_file: cfg.cookies_file.clone(),
            ffmpeg_location,
            probe_timeout_secs: cfg.probe_timeout_secs,
            download_timeout: cfg.download_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Cookie jar path, only while the file is actually present
    pub fn cookies(&self) -> Option<&Path> {
        // Checked per call so a cookie jar dropped in later is picked up
        self.cookies_file.is_file().then_some(self.cookies_file.as_path())
    }

    /// Arguments for a metadata probe
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.probe_timeout_secs.to_string(),
        ];
        if let Some(cookies) = self.cookies() {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Arguments for the actual download
    pub fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--no-playlist".to_string(),
            "--output".to_string(),
            request.output_template.clone(),
            "--format".to_string(),
            request.format.clone(),
            "--max-filesize".to_string(),
            request.max_filesize.to_string(),
        ];
        if request.write_thumbnail {
            args.push("--write-thumbnail".to_string());
        }
        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }
        if let Some(cookies) = self.cookies() {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    fn command(&self, args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        cmd
    }
}

/// Failure text of a yt-dlp run: its ERROR lines, or all of stderr, or the exit code
fn failure_text(stderr: &str, exit_code: Option<i32>) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .filter(|l| l.trim_start().starts_with("ERROR"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    let trimmed = stderr.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("exit code {}", exit_code.unwrap_or(-1))
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        let cmd = self.command(self.probe_args(url));
        let output = run_with_deadline(cmd, Some(probe_deadline(self.probe_timeout_secs)), "yt-dlp probe").await?;

        if !output.success {
            return Err(ExtractorError::Extraction(failure_text(&output.stderr, output.exit_code)));
        }

        let info: MediaInfo = serde_json::from_str(&output.stdout)
            .with_context(|| format!("Failed to parse yt-dlp metadata for: {}", url))?;
        debug!(
            "Probed {}: {:?} ({:?}, {:?}s)",
            url, info.title, info.extractor, info.duration
        );
        Ok(info)
    }

    async fn download(&self, request: &DownloadRequest) -> Result<(), ExtractorError> {
        let cmd = self.command(self.download_args(request));
        let output = run_with_deadline(cmd, self.download_timeout, "yt-dlp download").await?;

        if !output.success {
            return Err(ExtractorError::Extraction(failure_text(&output.stderr, output.exit_code)));
        }
        Ok(())
    }
}
