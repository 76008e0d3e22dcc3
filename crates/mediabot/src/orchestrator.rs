use std::sync::Arc;
use humansize::{format_size, BINARY};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use crate::config::BotConfig;
use crate::extractor::{DownloadRequest, Extractor};
use crate::job::{Job, JobFailure, JobReport, JobState, JobToken};
use crate::notice;
use crate::resolver::FormatResolver;
use crate::store::{ArtifactGuard, ArtifactStore};
use crate::transcode::{check_size, produce_deliverable, Transcoder};
use crate::transport::{notify, update_status, ChatTransport, VideoUpload};

/// Tracked handle to a spawned job
#[derive(Debug)]
pub struct JobHandle {
    token: JobToken,
    url: String,
    handle: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn token(&self) -> &JobToken {
        &self.token
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the job to finish
    pub async fn wait(self) -> JobReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => JobReport {
                token: self.token,
                url: self.url,
                trail: vec![JobState::Failed(JobFailure::Internal(e.to_string()))],
                removed_files: 0,
            },
        }
    }
}

/// Runs jobs through resolve → download → transcode → size check → deliver → cleanup
pub struct JobOrchestrator {
    resolver: FormatResolver,
    extractor: Arc<dyn Extractor>,
    transcoder: Arc<dyn Transcoder>,
    transport: Arc<dyn ChatTransport>,
    store: ArtifactStore,
    limiter: Option<Arc<Semaphore>>,
    max_upload_bytes: u64,
    download_limit_bytes: u64,
}

impl JobOrchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        transport: Arc<dyn ChatTransport>,
        store: ArtifactStore,
        cfg: &BotConfig,
    ) -> Self {
        let limiter = cfg
            .max_concurrent_jobs
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        JobOrchestrator {
            resolver: FormatResolver::new(Arc::clone(&extractor)),
            extractor,
            transcoder,
            transport,
            store,
            limiter,
            max_upload_bytes: cfg.max_upload_bytes,
            download_limit_bytes: cfg.download_limit_bytes(),
        }
    }

    /// Launch a job as its own task
    ///
    /// A panic inside the job is caught here and reported like any other failure.
    pub fn spawn(self: &Arc<Self>, job: Job) -> JobHandle {
        let token = job.token.clone();
        let url = job.url.clone();
        let orchestrator = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let runner = Arc::clone(&orchestrator);
            let inner = tokio::spawn({
                let job = job.clone();
                async move { runner.run(job).await }
            });

            match inner.await {
                Ok(report) => report,
                Err(e) => {
                    error!("Job {}: 💥 Job task aborted: {}", job.token, e);
                    if !job.silent {
                        notify(orchestrator.transport.as_ref(), job.notice_target(), notice::GENERIC_ERROR).await;
                    }
                    let removed_files = orchestrator.store.remove_job_artifacts(&job.token);
                    JobReport {
                        token: job.token,
                        url: job.url,
                        trail: vec![JobState::Failed(JobFailure::Internal(e.to_string()))],
                        removed_files,
                    }
                }
            }
        });

        JobHandle { token, url, handle }
    }

    /// Drive one job to `Done` or `Failed`; its files are removed on every path
    pub async fn run(&self, job: Job) -> JobReport {
        let _permit = match &self.limiter {
            Some(limiter) => {
                debug!("Job {}: Waiting for a free slot", job.token);
                Arc::clone(limiter).acquire_owned().await.ok()
            }
            None => None,
        };

        let guard = ArtifactGuard::new(self.store.clone(), job.token.clone());
        let mut trail = Vec::new();
        let outcome = self.execute(&job, &mut trail).await;

        if let Err(failure) = &outcome {
            match failure {
                JobFailure::Resolution(_) | JobFailure::TooLarge { .. } => {
                    warn!("Job {}: ⚠️  {} ({})", job.token, failure, job.url)
                }
                _ => error!("Job {}: ❌ {} ({})", job.token, failure, job.url),
            }
            if !job.silent {
                notify(self.transport.as_ref(), job.notice_target(), &failure.notice()).await;
            }
        }

        trail.push(JobState::CleaningUp);
        let removed_files = guard.release();
        debug!("Job {}: Removed {} file(s)", job.token, removed_files);

        match outcome {
            Ok(()) => {
                info!("Job {}: ✅ Done", job.token);
                trail.push(JobState::Done);
            }
            Err(failure) => trail.push(JobState::Failed(failure)),
        }

        JobReport { token: job.token, url: job.url, trail, removed_files }
    }

    async fn execute(&self, job: &Job, trail: &mut Vec<JobState>) -> Result<(), JobFailure> {
        let transport = self.transport.as_ref();

        trail.push(JobState::Resolving);
        info!("Job {}: 🔎 Resolving {}", job.token, job.url);
        let plan = self.resolver.resolve(&job.url).await.map_err(JobFailure::Resolution)?;

        trail.push(JobState::AwaitingFormatResult);
        debug!("Job {}: Format {} for \"{}\"", job.token, plan.format, plan.title);

        trail.push(JobState::Downloading);
        let request = DownloadRequest {
            url: job.url.clone(),
            format: plan.format.clone(),
            output_template: self.store.output_template(&job.token),
            max_filesize: self.download_limit_bytes,
            write_thumbnail: true,
        };
        self.extractor
            .download(&request)
            .await
            .map_err(|e| JobFailure::Download(e.to_string()))?;

        let artifacts = self.store.job_artifacts(&job.token);
        let raw = artifacts
            .video
            .ok_or_else(|| JobFailure::Download("no video file produced".to_string()))?;
        info!("Job {}: ⬇️  Downloaded {}", job.token, raw.display());
        update_status(transport, job.status.as_ref(), notice::PROCESSING).await;

        trail.push(JobState::Transcoding);
        let output = self.store.final_output_path(&job.token);
        let deliverable =
            produce_deliverable(self.transcoder.as_ref(), &job.token, &raw, &output, job.trim.as_ref()).await?;

        trail.push(JobState::SizeChecking);
        let size = check_size(&deliverable, self.max_upload_bytes)?;
        info!(
            "Job {}: Deliverable is {} (limit {})",
            job.token,
            format_size(size, BINARY),
            format_size(self.max_upload_bytes, BINARY)
        );

        trail.push(JobState::Delivering);
        update_status(transport, job.status.as_ref(), notice::UPLOADING).await;
        let upload = VideoUpload {
            video: deliverable,
            thumbnail: artifacts.thumbnail,
            caption: plan.title,
        };
        transport
            .reply_video(&job.target, &upload)
            .await
            .map_err(|e| JobFailure::Delivery(format!("{:#}", e)))?;
        info!("Job {}: 📤 Delivered to chat {}", job.token, job.target.chat_id);

        if let Some(status) = job.status.as_ref().filter(|s| s.bot_authored) {
            if let Err(e) = transport.delete(status).await {
                debug!("Job {}: Could not delete status message: {}", job.token, e);
            }
        }

        Ok(())
    }
}
