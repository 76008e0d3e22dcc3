pub mod config;
pub mod classifier;
pub mod trim;
pub mod correlator;
pub mod job;
pub mod notice;
pub mod process;
pub mod store;
pub mod extractor;
pub mod resolver;
pub mod transcode;
pub mod transport;
pub mod orchestrator;
pub mod router;
pub mod janitor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::BotConfig;
pub use classifier::UrlClassifier;
pub use correlator::RequestCorrelator;
pub use extractor::{Extractor, YtDlp};
pub use job::{Job, JobFailure, JobReport, JobState, JobToken};
pub use orchestrator::{JobHandle, JobOrchestrator};
pub use router::{InboundMessage, RouteOutcome, Router};
pub use store::ArtifactStore;
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use transport::{Button, ChatKind, ChatTransport, MessageRef, VideoUpload};
