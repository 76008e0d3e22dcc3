use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One mebibyte in bytes
pub const MIB: u64 = 1024 * 1024;

/// Hosts whose links are assumed to carry media
pub const DEFAULT_SUPPORTED_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "instagram.com",
    "reddit.com",
    "twitch.tv",
    "x.com",
    "twitter.com",
    "vk.com",
    "pin.it",
    "pinterest.com",
];

/// Path suffixes that mark a direct link to a media file
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".webm", ".mov", ".avi", ".flv", ".ogv", ".ogg", ".m4v", ".3gp", ".ts",
];

/// Configuration for the media bot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Directory holding downloads and re-encodes while a job runs
    pub download_dir: PathBuf,
    /// Largest deliverable accepted for upload (49.9 MiB keeps us under the 50 MiB platform cap)
    pub max_upload_bytes: u64,
    /// Allowance on top of `max_upload_bytes` handed to the extractor as its own size cap
    pub download_size_headroom_bytes: u64,
    /// Interval in seconds between sweeps of the download directory
    pub cleanup_interval_secs: u64,
    /// Age in seconds after which a file in the download directory is swept
    pub file_ttl_secs: u64,
    /// Age in seconds after which an unanswered download/trim choice expires
    pub pending_ttl_secs: u64,
    /// Socket timeout in seconds for the metadata probe
    pub probe_timeout_secs: u64,
    /// Deadline for the media download, unbounded when unset
    pub download_timeout_secs: Option<u64>,
    /// Deadline for the re-encode, unbounded when unset
    pub transcode_timeout_secs: Option<u64>,
    /// Upper bound on jobs running their pipeline at once, unbounded when unset
    pub max_concurrent_jobs: Option<usize>,
    /// Cookie jar handed to the extractor when the file exists
    pub cookies_file: PathBuf,
    /// Path to the yt-dlp binary
    pub ytdlp_bin: PathBuf,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Allow-listed media hosts (substring match against the URL host)
    pub supported_domains: Vec<String>,
    /// Media file extensions (suffix match against the URL path)
    pub video_extensions: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl BotConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            max_upload_bytes: 52_323_942, // 49.9 MiB
            download_size_headroom_bytes: 50 * MIB,
            cleanup_interval_secs: 600,
            file_ttl_secs: 900,
            pending_ttl_secs: 3600,
            probe_timeout_secs: 10,
            download_timeout_secs: None,
            transcode_timeout_secs: None,
            max_concurrent_jobs: None,
            cookies_file: PathBuf::from("cookies.txt"),
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            supported_domains: DEFAULT_SUPPORTED_DOMAINS.iter().map(|s| s.to_string()).collect(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        for warning in config.validate() {
            log::warn!("Config: {}", warning);
        }

        Ok(config)
    }

    /// Check tuning invariants, returning one message per violation
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.max_upload_bytes == 0 {
            warnings.push("max_upload_bytes is 0, every deliverable will be rejected".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            warnings.push("cleanup_interval_secs is 0, sweeping every second instead".to_string());
        }

        // The sweep must never catch a file that a running job still owns
        if let Some(worst_case) = self.worst_case_job_secs() {
            if self.file_ttl_secs <= worst_case {
                warnings.push(format!(
                    "file_ttl_secs ({}) does not exceed the worst-case job duration ({}s); \
                     the sweep may delete files of jobs still in progress",
                    self.file_ttl_secs, worst_case
                ));
            }
        }

        warnings
    }

    /// Sum of all stage deadlines, or None while any stage is unbounded
    pub fn worst_case_job_secs(&self) -> Option<u64> {
        let download = self.download_timeout_secs?;
        let transcode = self.transcode_timeout_secs?;
        Some(crate::extractor::probe_deadline(self.probe_timeout_secs).as_secs() + download + transcode)
    }

    /// Size cap handed to the extractor for the raw download
    pub fn download_limit_bytes(&self) -> u64 {
        self.max_upload_bytes.saturating_add(self.download_size_headroom_bytes)
    }


    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}
