use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;
use crate::config::BotConfig;
use crate::job::JobToken;

/// Raw download extensions picked up as the job's video
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "webm"];
/// Extensions picked up as the job's thumbnail
const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "png", "webp"];
/// Prefix of the re-encoded deliverable
const FINAL_PREFIX: &str = "final_";

/// Outcome of one TTL sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Files a download produced for one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobArtifacts {
    pub video: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
}

/// Directory of transient per-job files
///
/// Naming contract: every file a job writes here carries the job's token in
/// its name (`<title>_<token>.<ext>`, `final_<token>.mp4`). Cleanup finds a
/// job's files by that substring alone, so it works however far the job got.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    ttl: Duration,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        ArtifactStore { dir: dir.into(), ttl }
    }

    pub fn from_config(cfg: &BotConfig) -> Self {
        Self::new(cfg.download_dir.clone(), cfg.file_ttl())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create the download directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create download directory: {}", self.dir.display()))
    }

    /// yt-dlp output template for a job's raw download and thumbnail
    pub fn output_template(&self, token: &JobToken) -> String {
        self.dir
            .join(format!("%(title).50s_{}.%(ext)s", token))
            .to_string_lossy()
            .into_owned()
    }

    /// Path of the re-encoded deliverable
    pub fn final_output_path(&self, token: &JobToken) -> PathBuf {
        self.dir.join(format!("{}{}.mp4", FINAL_PREFIX, token))
    }

    /// Files directly inside the directory, sorted by name
    fn files(&self) -> Vec<walkdir::DirEntry> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("Error reading download directory entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .collect()
    }

    /// Every file belonging to a job
    pub fn files_for(&self, token: &JobToken) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|e| e.file_name().to_string_lossy().contains(token.as_str()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Pick out the downloaded video and thumbnail of a job
    pub fn job_artifacts(&self, token: &JobToken) -> JobArtifacts {
        let mut artifacts = JobArtifacts::default();

        for path in self.files_for(token) {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with(FINAL_PREFIX) {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase());

            match ext.as_deref() {
                Some(e) if VIDEO_EXTENSIONS.contains(&e) => artifacts.video = Some(path),
                Some(e) if THUMBNAIL_EXTENSIONS.contains(&e) => artifacts.thumbnail = Some(path),
                _ => {}
            }
        }

        artifacts
    }

    /// Delete every file of a job, best-effort; returns how many were removed
    pub fn remove_job_artifacts(&self, token: &JobToken) -> usize {
        let mut removed = 0;
        for path in self.files_for(token) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!("Job {}: 🗑️  Removed {}", token, path.display());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Job {}: Failed to remove {}: {}", token, path.display(), e),
            }
        }
        removed
    }

    /// Delete every file whose age at `now` exceeds the TTL
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for entry in self.files() {
            report.scanned += 1;

            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(m) => m,
                None => {
                    debug!("No modification time for {}, skipping", entry.path().display());
                    continue;
                }
            };
            // A timestamp in the future counts as brand new
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.ttl {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    report.deleted += 1;
                    info!("🧹 Swept {} (age {}s)", entry.file_name().to_string_lossy(), age.as_secs());
                }
                Err(e) => {
                    // Possibly mid-write by a running job; the next sweep retries
                    report.failed += 1;
                    warn!("Failed to sweep {}: {}", entry.path().display(), e);
                }
            }
        }

        report
    }

    /// Run one sweep off the async loop
    pub async fn sweep(&self) -> Result<SweepReport> {
        if !self.dir.exists() {
            return Ok(SweepReport::default());
        }
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.sweep_at(SystemTime::now()))
            .await
            .context("Sweep task failed")
    }
}

/// Removes a job's files when dropped, on every exit path of the job
#[derive(Debug)]
pub struct ArtifactGuard {
    store: ArtifactStore,
    token: JobToken,
    released: bool,
}

impl ArtifactGuard {
    pub fn new(store: ArtifactStore, token: JobToken) -> Self {
        ArtifactGuard { store, token, released: false }
    }

    /// Clean up now and report how many files went away
    pub fn release(mut self) -> usize {
        self.released = true;
        self.store.remove_job_artifacts(&self.token)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.released {
            let removed = self.store.remove_job_artifacts(&self.token);
            debug!("Job {}: guard removed {} file(s) on unwind", self.token, removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn set_age(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_sweep_respects_ttl() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(15 * 60));

        let old = dir.path().join("old_clip_aaaa.mp4");
        let recent = dir.path().join("recent_clip_bbbb.mp4");
        fs::write(&old, b"old").unwrap();
        fs::write(&recent, b"recent").unwrap();
        set_age(&old, Duration::from_secs(16 * 60));
        set_age(&recent, Duration::from_secs(5 * 60));

        let report = store.sweep_at(SystemTime::now());
        assert_eq!(report, SweepReport { scanned: 2, deleted: 1, failed: 0 });
        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[test]
    fn test_sweep_ignores_subdirectories() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::ZERO);
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("keep.mp4"), b"x").unwrap();

        let report = store.sweep_at(SystemTime::now() + Duration::from_secs(60));
        assert_eq!(report.scanned, 0);
        assert!(dir.path().join("nested").join("keep.mp4").exists());
    }

    #[tokio::test]
    async fn test_sweep_on_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"), Duration::ZERO);
        assert_eq!(store.sweep().await.unwrap(), SweepReport::default());
    }

    #[test]
    fn test_job_artifacts_are_found_by_token() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(900));
        let token = JobToken::new();
        let other = JobToken::new();

        fs::write(dir.path().join(format!("Some title_{}.webm", token)), b"v").unwrap();
        fs::write(dir.path().join(format!("Some title_{}.jpg", token)), b"t").unwrap();
        fs::write(dir.path().join(format!("Some title_{}.info.json", token)), b"{}").unwrap();
        fs::write(dir.path().join(format!("Other_{}.mp4", other)), b"o").unwrap();

        let artifacts = store.job_artifacts(&token);
        assert_eq!(artifacts.video, Some(dir.path().join(format!("Some title_{}.webm", token))));
        assert_eq!(artifacts.thumbnail, Some(dir.path().join(format!("Some title_{}.jpg", token))));

        assert_eq!(store.remove_job_artifacts(&token), 3);
        assert!(store.files_for(&token).is_empty());
        assert_eq!(store.files_for(&other).len(), 1);
        // second cleanup is a no-op
        assert_eq!(store.remove_job_artifacts(&token), 0);
    }

    #[test]
    fn test_final_output_is_not_a_raw_video() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(900));
        let token = JobToken::new();

        fs::write(store.final_output_path(&token), b"final").unwrap();
        assert_eq!(store.job_artifacts(&token), JobArtifacts::default());
        assert!(store.output_template(&token).ends_with(&format!("%(title).50s_{}.%(ext)s", token)));
    }

    #[test]
    fn test_guard_cleans_up_when_dropped() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(900));
        let token = JobToken::new();
        fs::write(dir.path().join(format!("a_{}.mp4", token)), b"v").unwrap();

        {
            let _guard = ArtifactGuard::new(store.clone(), token.clone());
        }
        assert!(store.files_for(&token).is_empty());

        fs::write(dir.path().join(format!("b_{}.mp4", token)), b"v").unwrap();
        let guard = ArtifactGuard::new(store.clone(), token.clone());
        assert_eq!(guard.release(), 1);
    }
}
