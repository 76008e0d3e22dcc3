use std::path::PathBuf;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use crate::correlator::PromptId;

/// Kind of chat a message arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// Handle to a message on the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
    /// Sent by this bot, so it may be edited or deleted
    pub bot_authored: bool,
    /// The message this one replies to, one level deep
    pub reply_to: Option<Box<MessageRef>>,
}

impl MessageRef {
    pub fn prompt_id(&self) -> PromptId {
        PromptId { chat_id: self.chat_id, message_id: self.message_id }
    }

    /// The message a reply to this one should really go to
    pub fn delivery_target(&self) -> &MessageRef {
        self.reply_to.as_deref().unwrap_or(self)
    }
}

/// Inline button carrying a short callback payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Button { label: label.into(), data: data.into() }
    }
}

/// Finished video ready to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUpload {
    pub video: PathBuf,
    pub thumbnail: Option<PathBuf>,
    pub caption: String,
}

/// Outbound side of the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Reply with plain text
    async fn reply_text(&self, to: &MessageRef, text: &str) -> Result<MessageRef>;

    /// Reply with text and one button per row
    async fn reply_choice(&self, to: &MessageRef, text: &str, buttons: &[Button]) -> Result<MessageRef>;

    /// Reply with text that asks the user to answer it directly
    async fn reply_force(&self, to: &MessageRef, text: &str) -> Result<MessageRef>;

    /// Reply with a streamable video
    async fn reply_video(&self, to: &MessageRef, upload: &VideoUpload) -> Result<MessageRef>;

    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<()>;

    async fn delete(&self, message: &MessageRef) -> Result<()>;
}

/// Best-effort progress update; only bot-authored messages are touched and failures are swallowed
pub async fn update_status(transport: &dyn ChatTransport, status: Option<&MessageRef>, text: &str) {
    let Some(status) = status else {
        return;
    };
    if !status.bot_authored {
        return;
    }
    if let Err(e) = transport.edit_text(status, text).await {
        debug!("Status update on message {} failed: {}", status.message_id, e);
    }
}

/// Show a notice in place of `message` when possible, otherwise as a new reply
pub async fn notify(transport: &dyn ChatTransport, message: &MessageRef, text: &str) {
    if message.bot_authored {
        match transport.edit_text(message, text).await {
            Ok(()) => return,
            Err(e) => debug!("Edit of message {} failed, replying instead: {}", message.message_id, e),
        }
    }
    if let Err(e) = transport.reply_text(message, text).await {
        warn!("Failed to deliver notice to chat {}: {}", message.chat_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, Sent};

    fn user_message() -> MessageRef {
        MessageRef { chat_id: 5, message_id: 1, bot_authored: false, reply_to: None }
    }

    #[tokio::test]
    async fn test_status_updates_skip_user_messages() {
        let transport = RecordingTransport::new();
        update_status(&transport, Some(&user_message()), "⚙️").await;
        update_status(&transport, None, "⚙️").await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notify_edits_bot_messages() {
        let transport = RecordingTransport::new();
        let status = transport.reply_text(&user_message(), "🚀").await.unwrap();
        notify(&transport, &status, "❌ Error").await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[1], Sent::Edit { message_id, text } if *message_id == status.message_id && text == "❌ Error"));
    }

    #[tokio::test]
    async fn test_notify_falls_back_to_reply() {
        let transport = RecordingTransport::new();
        let status = transport.reply_text(&user_message(), "🚀").await.unwrap();
        transport.fail_edits();
        notify(&transport, &status, "❌ Error").await;

        let sent = transport.sent();
        assert!(matches!(&sent[1], Sent::Text { reply_to, text } if *reply_to == status.message_id && text == "❌ Error"));
    }

    #[test]
    fn test_delivery_target_prefers_replied_message() {
        let user = user_message();
        let prompt = MessageRef { chat_id: 5, message_id: 2, bot_authored: true, reply_to: Some(Box::new(user.clone())) };
        assert_eq!(prompt.delivery_target(), &user);
        assert_eq!(user.delivery_target(), &user);
    }
}
