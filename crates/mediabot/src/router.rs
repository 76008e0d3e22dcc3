use std::sync::Arc;
use anyhow::Result;
use log::{debug, info};
use crate::classifier::{extract_urls, is_platform_link, UrlClassifier};
use crate::correlator::{PromptId, RequestCorrelator};
use crate::job::Job;
use crate::notice;
use crate::orchestrator::{JobHandle, JobOrchestrator};
use crate::transport::{update_status, Button, ChatKind, ChatTransport, MessageRef};
use crate::trim::parse_trim_reply;

/// A text or captioned message as it arrived
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message: MessageRef,
    pub chat_kind: ChatKind,
    /// Message text, or its caption when there is no text
    pub text: String,
}

/// Button press on one of our choice prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Download(String),
    AskTrim(String),
}

impl CallbackAction {
    pub fn token(&self) -> &str {
        match self {
            CallbackAction::Download(token) | CallbackAction::AskTrim(token) => token,
        }
    }
}

/// Split `action|token` callback data; anything else is `None`
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let (action, token) = data.split_once('|')?;
    if token.is_empty() || token.contains('|') {
        return None;
    }
    match action {
        "dl" => Some(CallbackAction::Download(token.to_string())),
        "ask_trim" => Some(CallbackAction::AskTrim(token.to_string())),
        _ => None,
    }
}

fn callback_data(action: &str, token: &str) -> String {
    format!("{}|{}", action, token)
}

/// What the router did with an update
#[derive(Debug)]
pub enum RouteOutcome {
    /// Nothing to do: no usable links, unknown command or unknown button
    Ignored,
    Greeted,
    /// A download/trim choice was shown for a single link
    Prompted { token: String, prompt: MessageRef },
    /// Jobs started, one per media link
    Launched(Vec<JobHandle>),
    /// A force-reply asking for the time range was sent
    TrimPromptSent(MessageRef),
    /// The time range could not be parsed; the prompt is still open
    TrimRejected,
    /// The request behind a button or prompt is gone
    Stale,
}

/// Turns inbound messages and button presses into prompts and jobs
pub struct Router {
    classifier: UrlClassifier,
    correlator: Arc<RequestCorrelator>,
    orchestrator: Arc<JobOrchestrator>,
    transport: Arc<dyn ChatTransport>,
}

impl Router {
    pub fn new(
        classifier: UrlClassifier,
        correlator: Arc<RequestCorrelator>,
        orchestrator: Arc<JobOrchestrator>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Router { classifier, correlator, orchestrator, transport }
    }

    pub async fn on_message(&self, inbound: &InboundMessage) -> Result<RouteOutcome> {
        let text = inbound.text.trim();

        if let Some(command) = text.strip_prefix('/') {
            return self.on_command(inbound, command).await;
        }

        if let Some(replied) = &inbound.message.reply_to {
            let prompt = replied.prompt_id();
            if let Some(token) = self.correlator.resolve_trim_prompt(prompt) {
                return self.on_trim_reply(inbound, prompt, token).await;
            }
        }

        self.on_links(inbound).await
    }

    async fn on_command(&self, inbound: &InboundMessage, command: &str) -> Result<RouteOutcome> {
        // `/start@SomeBot args` names the bot explicitly in groups
        let name = command
            .split_whitespace()
            .next()
            .and_then(|c| c.split('@').next())
            .unwrap_or_default()
            .to_lowercase();

        if name == "start" {
            self.transport.reply_text(&inbound.message, notice::GREETING).await?;
            return Ok(RouteOutcome::Greeted);
        }
        debug!("Ignoring command /{}", name);
        Ok(RouteOutcome::Ignored)
    }

    async fn on_links(&self, inbound: &InboundMessage) -> Result<RouteOutcome> {
        let urls: Vec<String> = extract_urls(&inbound.text)
            .into_iter()
            .filter(|u| !is_platform_link(u))
            .collect();
        if urls.is_empty() {
            return Ok(RouteOutcome::Ignored);
        }

        let bulk = urls.len() > 1 || inbound.chat_kind != ChatKind::Private;
        let media: Vec<String> = urls
            .into_iter()
            .filter(|u| {
                let hit = self.classifier.looks_like_media(u);
                if !hit {
                    debug!("Skipping non-media link {}", u);
                }
                hit
            })
            .collect();

        if media.is_empty() {
            return Ok(RouteOutcome::Ignored);
        }

        if bulk {
            info!("📥 {} link(s) from chat {}, starting silently", media.len(), inbound.message.chat_id);
            let handles = media
                .into_iter()
                .map(|url| self.orchestrator.spawn(Job::bulk(url, inbound.message.clone())))
                .collect();
            return Ok(RouteOutcome::Launched(handles));
        }

        // Not bulk, so exactly one link
        let url = &media[0];
        let token = self.correlator.register_pending(url);
        let buttons = [
            Button::new(notice::PROMPT_DOWNLOAD_BUTTON, callback_data("dl", &token)),
            Button::new(notice::PROMPT_TRIM_BUTTON, callback_data("ask_trim", &token)),
        ];
        let prompt = self
            .transport
            .reply_choice(&inbound.message, &notice::choice(url), &buttons)
            .await?;
        debug!("Request {} pending for {}", token, url);
        Ok(RouteOutcome::Prompted { token, prompt })
    }

    /// Handle a press on a choice button; `prompt` is the message carrying the buttons
    pub async fn on_callback(&self, prompt: &MessageRef, data: &str) -> Result<RouteOutcome> {
        let Some(action) = parse_callback(data) else {
            debug!("Ignoring callback data {:?}", data);
            return Ok(RouteOutcome::Ignored);
        };

        match action {
            CallbackAction::Download(token) => {
                let Some(url) = self.correlator.claim(&token) else {
                    return self.expire_prompt(prompt, &token).await;
                };
                update_status(self.transport.as_ref(), Some(prompt), notice::STARTING).await;
                let handle = self.orchestrator.spawn(Job::interactive(url, None, prompt.clone()));
                info!("Job {}: 🚀 Started from request {}", handle.token(), token);
                Ok(RouteOutcome::Launched(vec![handle]))
            }
            CallbackAction::AskTrim(token) => {
                if self.correlator.resolve(&token).is_none() {
                    return self.expire_prompt(prompt, &token).await;
                }
                let ask = self.transport.reply_force(prompt, notice::TRIM_PROMPT).await?;
                self.correlator.bind_trim_prompt(ask.prompt_id(), &token);
                Ok(RouteOutcome::TrimPromptSent(ask))
            }
        }
    }

    async fn expire_prompt(&self, prompt: &MessageRef, token: &str) -> Result<RouteOutcome> {
        debug!("Request {} is stale", token);
        update_status(self.transport.as_ref(), Some(prompt), notice::LINK_EXPIRED).await;
        Ok(RouteOutcome::Stale)
    }

    async fn on_trim_reply(&self, inbound: &InboundMessage, prompt: PromptId, token: String) -> Result<RouteOutcome> {
        if self.correlator.resolve(&token).is_none() {
            self.correlator.drop_trim_prompt(prompt);
            self.transport.reply_text(&inbound.message, notice::LINK_EXPIRED).await?;
            return Ok(RouteOutcome::Stale);
        }

        let bounds = match parse_trim_reply(&inbound.text) {
            Ok(bounds) => bounds,
            Err(e) => {
                debug!("Rejected trim reply {:?}: {}", inbound.text, e);
                self.transport.reply_text(&inbound.message, notice::TRIM_EXAMPLE).await?;
                return Ok(RouteOutcome::TrimRejected);
            }
        };

        // Lost a race with another reply or the janitor
        let Some(url) = self.correlator.claim(&token) else {
            self.correlator.drop_trim_prompt(prompt);
            self.transport.reply_text(&inbound.message, notice::LINK_EXPIRED).await?;
            return Ok(RouteOutcome::Stale);
        };
        self.correlator.drop_trim_prompt(prompt);

        let status = self
            .transport
            .reply_text(&inbound.message, &notice::trimming(&bounds))
            .await?;
        let handle = self.orchestrator.spawn(Job::interactive(url, Some(bounds), status));
        info!("Job {}: ✂️  Started from request {} ({}s)", handle.token(), token, bounds);
        Ok(RouteOutcome::Launched(vec![handle]))
    }
}
