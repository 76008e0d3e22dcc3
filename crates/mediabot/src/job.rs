use std::fmt;
use humansize::{format_size, BINARY};
use thiserror::Error;
use uuid::Uuid;
use crate::resolver::FailureReason;
use crate::transport::MessageRef;
use crate::trim::TrimBounds;

/// Process-unique correlation token embedded in every file name a job writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobToken(String);

impl JobToken {
    pub fn new() -> Self {
        JobToken(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One end-to-end download → transcode → deliver run for a single URL
#[derive(Debug, Clone)]
pub struct Job {
    pub token: JobToken,
    pub url: String,
    pub trim: Option<TrimBounds>,
    /// Bot-authored progress message, edited in place as the job advances
    pub status: Option<MessageRef>,
    /// Message the finished video is sent as a reply to
    pub target: MessageRef,
    /// Suppress user-facing failure notices
    pub silent: bool,
}

impl Job {
    /// Job started from an interactive choice; progress shows in `status`
    pub fn interactive(url: impl Into<String>, trim: Option<TrimBounds>, status: MessageRef) -> Self {
        let target = status.delivery_target().clone();
        Job {
            token: JobToken::new(),
            url: url.into(),
            trim,
            status: Some(status),
            target,
            silent: false,
        }
    }

    /// Job started straight from a bulk/group message; failures stay quiet
    pub fn bulk(url: impl Into<String>, origin: MessageRef) -> Self {
        Job {
            token: JobToken::new(),
            url: url.into(),
            trim: None,
            status: None,
            target: origin,
            silent: true,
        }
    }

    /// Where failure notices go: the status message if there is one, else the target
    pub fn notice_target(&self) -> &MessageRef {
        self.status.as_ref().unwrap_or(&self.target)
    }
}

/// Why a job did not deliver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobFailure {
    #[error("resolution failed ({0})")]
    Resolution(FailureReason),
    #[error("download failed: {0}")]
    Download(String),
    #[error("transcode failed: {0}")]
    Transcode(String),
    #[error("deliverable is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobFailure {
    /// Short text shown to the user in place of the progress message
    pub fn notice(&self) -> String {
        match self {
            JobFailure::Resolution(reason) => format!("❌ Unavailable ({})", reason.code()),
            JobFailure::TooLarge { size, limit } => format!(
                "❌ Too large: {} (limit {})",
                format_size(*size, BINARY),
                format_size(*limit, BINARY)
            ),
            JobFailure::Download(_)
            | JobFailure::Transcode(_)
            | JobFailure::Delivery(_)
            | JobFailure::Internal(_) => crate::notice::GENERIC_ERROR.to_string(),
        }
    }
}

/// Pipeline position of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Resolving,
    AwaitingFormatResult,
    Downloading,
    Transcoding,
    SizeChecking,
    Delivering,
    CleaningUp,
    Done,
    Failed(JobFailure),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}

/// What a finished job reports back to its supervisor
#[derive(Debug, Clone)]
pub struct JobReport {
    pub token: JobToken,
    pub url: String,
    /// States in the order they were entered, ending in `Done` or `Failed`
    pub trail: Vec<JobState>,
    /// Files removed by the final cleanup
    pub removed_files: usize,
}

impl JobReport {
    pub fn final_state(&self) -> Option<&JobState> {
        self.trail.last()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self.trail.last() {
            Some(JobState::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.trail.last(), Some(JobState::Done))
    }
}
