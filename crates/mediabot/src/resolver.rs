use std::fmt;
use std::sync::Arc;
use log::{debug, warn};
use crate::extractor::{Extractor, ExtractorError};

/// Best available video+audio pair, or the best single stream carrying both
pub const BEST_FORMAT: &str = "bestvideo+bestaudio/best";

/// Caption used when the probe reports no title
const FALLBACK_TITLE: &str = "Video";

/// Why a URL could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Private,
    LoginRequired,
    BotBlocked,
    GenericError,
    Unknown,
}

impl FailureReason {
    /// Short code shown to users
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Private => "private",
            FailureReason::LoginRequired => "login_req",
            FailureReason::BotBlocked => "bot_block",
            FailureReason::GenericError => "error",
            FailureReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Markers checked in order; the first one found decides
const FAILURE_MARKERS: &[(&str, FailureReason)] = &[
    ("private", FailureReason::Private),
    ("sign in", FailureReason::LoginRequired),
    ("bot", FailureReason::BotBlocked),
];

/// Map extractor failure text to a reason
pub fn classify_failure(text: &str) -> FailureReason {
    let text = text.to_lowercase();
    FAILURE_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, reason)| *reason)
        .unwrap_or(FailureReason::GenericError)
}

/// What to download and how to caption it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    pub format: String,
    pub title: String,
}

/// Probes a URL and turns the outcome into a plan or a classified failure
#[derive(Clone)]
pub struct FormatResolver {
    extractor: Arc<dyn Extractor>,
}

impl FormatResolver {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        FormatResolver { extractor }
    }

    pub async fn resolve(&self, url: &str) -> Result<FormatPlan, FailureReason> {
        match self.extractor.probe(url).await {
            Ok(info) => {
                let title = info
                    .title
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| FALLBACK_TITLE.to_string());
                debug!("Resolved {} to \"{}\"", url, title);
                Ok(FormatPlan { format: BEST_FORMAT.to_string(), title })
            }
            Err(ExtractorError::Extraction(text)) => {
                let reason = classify_failure(&text);
                warn!("Resolution of {} failed ({}): {}", url, reason, text);
                Err(reason)
            }
            Err(ExtractorError::Other(e)) => {
                warn!("Resolution of {} failed unexpectedly: {:#}", url, e);
                Err(FailureReason::Unknown)
            }
        }
    }
}
