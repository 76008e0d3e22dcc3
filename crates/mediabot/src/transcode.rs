use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use humansize::{format_size, BINARY};
use log::{debug, error, info, warn};
use tokio::process::Command;
use crate::config::BotConfig;
use crate::job::{JobFailure, JobToken};
use crate::process::run_with_deadline;
use crate::trim::TrimBounds;

/// Re-encodes a raw download into the delivery profile
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write `output` from `input`, cut to `trim` when given
    ///
    /// Any error means `output` must not be trusted.
    async fn transcode(&self, input: &Path, output: &Path, trim: Option<&TrimBounds>) -> Result<()>;
}

/// Build the ffmpeg argument list for the delivery profile
///
/// H.264 superfast at CRF 23 in 8-bit 4:2:0, AAC 128k, moov atom up front for streaming.
pub fn build_transcode_args(input: &Path, output: &Path, trim: Option<&TrimBounds>) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    if let Some(bounds) = trim {
        args.push("-ss".to_string());
        args.push(bounds.start().to_string());
        args.push("-to".to_string());
        args.push(bounds.end().to_string());
    }

    args.extend(
        [
            "-c:v", "libx264",
            "-preset", "superfast",
            "-crf", "23",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-b:a", "128k",
            "-movflags", "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    args.push(output.to_string_lossy().to_string());
    args
}

/// ffmpeg run as a subprocess
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    bin: PathBuf,
    deadline: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<PathBuf>, deadline: Option<Duration>) -> Self {
        FfmpegTranscoder { bin: bin.into(), deadline }
    }

    pub fn from_config(cfg: &BotConfig) -> Self {
        Self::new(cfg.ffmpeg_bin.clone(), cfg.transcode_timeout_secs.map(Duration::from_secs))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, trim: Option<&TrimBounds>) -> Result<()> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(build_transcode_args(input, output, trim));

        let result = run_with_deadline(cmd, self.deadline, "ffmpeg").await?;
        if !result.success {
            // Diagnostics go to the log only
            error!("ffmpeg failed on {} with exit code {:?}", input.display(), result.exit_code);
            for line in result.stderr.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev() {
                error!("  ffmpeg: {}", line);
            }
            return Err(anyhow!("ffmpeg exited with code {:?}", result.exit_code));
        }
        Ok(())
    }
}

/// Re-encode the raw download and hand back the deliverable
///
/// On success the raw file is gone and only the returned path remains.
pub async fn produce_deliverable(
    transcoder: &dyn Transcoder,
    token: &JobToken,
    raw: &Path,
    output: &Path,
    trim: Option<&TrimBounds>,
) -> Result<PathBuf, JobFailure> {
    match trim {
        Some(bounds) => info!("Job {}: Transcoding {} (trim {}s)", token, raw.display(), bounds),
        None => info!("Job {}: Transcoding {}", token, raw.display()),
    }

    if let Err(e) = transcoder.transcode(raw, output, trim).await {
        error!("Job {}: ❌ Transcode failed: {:#}", token, e);
        return Err(JobFailure::Transcode(e.to_string()));
    }

    let size = match tokio::fs::metadata(output).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!("Job {}: ❌ Transcoder reported success but {} is missing: {}", token, output.display(), e);
            return Err(JobFailure::Transcode(format!("missing output: {}", output.display())));
        }
    };
    if size == 0 {
        error!("Job {}: ❌ Transcoder produced an empty file", token);
        return Err(JobFailure::Transcode("empty output".to_string()));
    }

    if let Err(e) = tokio::fs::remove_file(raw).await {
        // Cleanup picks it up later by token
        warn!("Job {}: Could not remove raw download {}: {}", token, raw.display(), e);
    }

    debug!("Job {}: Deliverable {} is {}", token, output.display(), format_size(size, BINARY));
    Ok(output.to_path_buf())
}

/// Size gate; a file exactly at the limit passes
pub fn exceeds_limit(size: u64, limit: u64) -> bool {
    size > limit
}

/// Measure the deliverable and reject it when over the limit; returns its size
pub fn check_size(path: &Path, limit: u64) -> Result<u64, JobFailure> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat deliverable: {}", path.display()))
        .map_err(|e| JobFailure::Internal(format!("{:#}", e)))?
        .len();

    if exceeds_limit(size, limit) {
        return Err(JobFailure::TooLarge { size, limit });
    }
    Ok(size)
}
