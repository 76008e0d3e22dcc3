//! Test doubles for the external collaborators

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use crate::extractor::{DownloadRequest, Extractor, ExtractorError, MediaInfo};
use crate::transcode::Transcoder;
use crate::transport::{Button, ChatTransport, MessageRef, VideoUpload};
use crate::trim::TrimBounds;

#[derive(Debug, Clone)]
enum ProbeBehaviour {
    Title(Option<String>),
    Fails(String),
    Errors(String),
}

/// Extractor that writes fake artifacts following the output template
#[derive(Debug)]
pub struct StubExtractor {
    probe: ProbeBehaviour,
    download_error: Option<String>,
    probes: AtomicUsize,
    downloads: AtomicUsize,
}

impl StubExtractor {
    fn with_probe(probe: ProbeBehaviour) -> Self {
        StubExtractor {
            probe,
            download_error: None,
            probes: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn titled(title: &str) -> Self {
        Self::with_probe(ProbeBehaviour::Title(Some(title.to_string())))
    }

    pub fn untitled() -> Self {
        Self::with_probe(ProbeBehaviour::Title(None))
    }

    /// Probe reports failure text, as the extractor would for a rejected URL
    pub fn probe_fails(text: &str) -> Self {
        Self::with_probe(ProbeBehaviour::Fails(text.to_string()))
    }

    /// Probe breaks outside the extractor's own logic
    pub fn probe_errors(text: &str) -> Self {
        Self::with_probe(ProbeBehaviour::Errors(text.to_string()))
    }

    /// Leaves a partial file behind and then fails
    pub fn download_fails(mut self, text: &str) -> Self {
        self.download_error = Some(text.to_string());
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

fn render_template(template: &str, ext: &str) -> PathBuf {
    PathBuf::from(template.replace("%(title).50s", "clip").replace("%(ext)s", ext))
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn probe(&self, _url: &str) -> Result<MediaInfo, ExtractorError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match &self.probe {
            ProbeBehaviour::Title(title) => Ok(MediaInfo { title: title.clone(), ..Default::default() }),
            ProbeBehaviour::Fails(text) => Err(ExtractorError::Extraction(text.clone())),
            ProbeBehaviour::Errors(text) => Err(ExtractorError::Other(anyhow!(text.clone()))),
        }
    }

    async fn download(&self, request: &DownloadRequest) -> Result<(), ExtractorError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(text) = &self.download_error {
            std::fs::write(render_template(&request.output_template, "mp4.part"), b"partial")
                .map_err(anyhow::Error::from)?;
            return Err(ExtractorError::Extraction(text.clone()));
        }
        std::fs::write(render_template(&request.output_template, "mp4"), vec![0u8; 64])
            .map_err(anyhow::Error::from)?;
        if request.write_thumbnail {
            std::fs::write(render_template(&request.output_template, "jpg"), b"thumb")
                .map_err(anyhow::Error::from)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum TranscodeBehaviour {
    Copy,
    Sized(usize),
    Fail,
    Panic,
}

/// Transcoder that copies, writes a fixed size, fails or panics
#[derive(Debug)]
pub struct StubTranscoder {
    behaviour: TranscodeBehaviour,
    calls: Mutex<Vec<Option<TrimBounds>>>,
}

impl StubTranscoder {
    fn with(behaviour: TranscodeBehaviour) -> Self {
        StubTranscoder { behaviour, calls: Mutex::new(Vec::new()) }
    }

    pub fn copying() -> Self {
        Self::with(TranscodeBehaviour::Copy)
    }

    pub fn sized(bytes: usize) -> Self {
        Self::with(TranscodeBehaviour::Sized(bytes))
    }

    pub fn failing() -> Self {
        Self::with(TranscodeBehaviour::Fail)
    }

    pub fn panicking() -> Self {
        Self::with(TranscodeBehaviour::Panic)
    }

    /// Trim bounds of every call so far
    pub fn calls(&self) -> Vec<Option<TrimBounds>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, trim: Option<&TrimBounds>) -> Result<()> {
        self.calls.lock().unwrap().push(trim.copied());
        match self.behaviour {
            TranscodeBehaviour::Copy => {
                std::fs::copy(input, output)?;
                Ok(())
            }
            TranscodeBehaviour::Sized(bytes) => {
                std::fs::write(output, vec![0u8; bytes])?;
                Ok(())
            }
            TranscodeBehaviour::Fail => Err(anyhow!("ffmpeg exited with code Some(1)")),
            TranscodeBehaviour::Panic => panic!("encoder crashed"),
        }
    }
}

/// Everything a `RecordingTransport` was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { reply_to: i32, text: String },
    Choice { reply_to: i32, text: String, buttons: Vec<Button> },
    Force { reply_to: i32, text: String },
    Video { reply_to: i32, caption: String, has_thumbnail: bool, video_existed: bool },
    Edit { message_id: i32, text: String },
    Delete { message_id: i32 },
}

/// Chat transport that records every call
#[derive(Debug)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    fail_edits: AtomicBool,
    fail_videos: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport {
            sent: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1000),
            fail_edits: AtomicBool::new(false),
            fail_videos: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn fail_videos(&self) {
        self.fail_videos.store(true, Ordering::SeqCst);
    }

    pub fn videos(&self) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| matches!(s, Sent::Video { .. })).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn new_message(&self, to: &MessageRef) -> MessageRef {
        let parent = MessageRef { reply_to: None, ..to.clone() };
        MessageRef {
            chat_id: to.chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            bot_authored: true,
            reply_to: Some(Box::new(parent)),
        }
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn reply_text(&self, to: &MessageRef, text: &str) -> Result<MessageRef> {
        self.record(Sent::Text { reply_to: to.message_id, text: text.to_string() });
        Ok(self.new_message(to))
    }

    async fn reply_choice(&self, to: &MessageRef, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        self.record(Sent::Choice {
            reply_to: to.message_id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(self.new_message(to))
    }

    async fn reply_force(&self, to: &MessageRef, text: &str) -> Result<MessageRef> {
        self.record(Sent::Force { reply_to: to.message_id, text: text.to_string() });
        Ok(self.new_message(to))
    }

    async fn reply_video(&self, to: &MessageRef, upload: &VideoUpload) -> Result<MessageRef> {
        if self.fail_videos.load(Ordering::SeqCst) {
            return Err(anyhow!("upload rejected"));
        }
        self.record(Sent::Video {
            reply_to: to.message_id,
            caption: upload.caption.clone(),
            has_thumbnail: upload.thumbnail.is_some(),
            video_existed: upload.video.is_file(),
        });
        Ok(self.new_message(to))
    }

    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(anyhow!("message to edit not found"));
        }
        self.record(Sent::Edit { message_id: message.message_id, text: text.to_string() });
        Ok(())
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        self.record(Sent::Delete { message_id: message.message_id });
        Ok(())
    }
}
