use std::time::Duration;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use mediabot::{Button, ChatKind, ChatTransport, InboundMessage, MessageRef, VideoUpload};
use teloxide::prelude::*;
use teloxide::types::{
    ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MaybeInaccessibleMessage,
    Message, MessageId, ReplyParameters, UserId,
};

/// Uploads of ~50 MiB need far more than the default request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Telegram side of the bot
pub struct TelegramTransport {
    bot: Bot,
    me: UserId,
}

impl TelegramTransport {
    /// Build the client and look up the bot's own identity
    pub async fn connect(token: &str) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let bot = Bot::with_client(token, client);

        let me = bot.get_me().await.context("Failed to reach Telegram (is the token valid?)")?;
        info!("Logged in as @{}", me.username());

        Ok(TelegramTransport { bot, me: me.id })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Our handle for a Telegram message, with one level of reply context
    pub fn message_ref(&self, msg: &Message) -> MessageRef {
        MessageRef {
            reply_to: msg.reply_to_message().map(|parent| Box::new(self.flat_ref(parent))),
            ..self.flat_ref(msg)
        }
    }

    fn flat_ref(&self, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            bot_authored: msg.from.as_ref().is_some_and(|u| u.id == self.me),
            reply_to: None,
        }
    }

    /// Text or captioned message from a user; `None` for everything else
    pub fn inbound(&self, msg: &Message) -> Option<InboundMessage> {
        let text = msg.text().or_else(|| msg.caption())?;
        let chat_kind = if msg.chat.is_private() { ChatKind::Private } else { ChatKind::Group };
        Some(InboundMessage {
            message: self.message_ref(msg),
            chat_kind,
            text: text.to_string(),
        })
    }

    /// The message carrying the pressed button, when Telegram still gives it to us
    pub fn callback_message(&self, query: &CallbackQuery) -> Option<MessageRef> {
        match query.message.as_ref()? {
            MaybeInaccessibleMessage::Regular(msg) => Some(self.message_ref(msg)),
            MaybeInaccessibleMessage::Inaccessible(_) => None,
        }
    }
}

fn reply_parameters(to: &MessageRef) -> ReplyParameters {
    ReplyParameters::new(MessageId(to.message_id))
}

fn keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.data.clone())]),
    )
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn reply_text(&self, to: &MessageRef, text: &str) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(ChatId(to.chat_id), text)
            .reply_parameters(reply_parameters(to))
            .await
            .with_context(|| format!("Failed to send message to chat {}", to.chat_id))?;
        Ok(self.message_ref(&sent))
    }

    async fn reply_choice(&self, to: &MessageRef, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(ChatId(to.chat_id), text)
            .reply_parameters(reply_parameters(to))
            .reply_markup(keyboard(buttons))
            .await
            .with_context(|| format!("Failed to send prompt to chat {}", to.chat_id))?;
        Ok(self.message_ref(&sent))
    }

    async fn reply_force(&self, to: &MessageRef, text: &str) -> Result<MessageRef> {
        let sent = self
            .bot
            .send_message(ChatId(to.chat_id), text)
            .reply_parameters(reply_parameters(to))
            .reply_markup(ForceReply::new().selective())
            .await
            .with_context(|| format!("Failed to send force-reply to chat {}", to.chat_id))?;
        Ok(self.message_ref(&sent))
    }

    async fn reply_video(&self, to: &MessageRef, upload: &VideoUpload) -> Result<MessageRef> {
        debug!("Uploading {} to chat {}", upload.video.display(), to.chat_id);
        let mut request = self
            .bot
            .send_video(ChatId(to.chat_id), InputFile::file(upload.video.clone()))
            .caption(upload.caption.clone())
            .supports_streaming(true)
            .reply_parameters(reply_parameters(to));
        if let Some(thumbnail) = &upload.thumbnail {
            request = request.thumbnail(InputFile::file(thumbnail.clone()));
        }
        let sent = request
            .await
            .with_context(|| format!("Failed to upload {}", upload.video.display()))?;
        Ok(self.message_ref(&sent))
    }

    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
            .with_context(|| format!("Failed to edit message {}", message.message_id))?;
        Ok(())
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .with_context(|| format!("Failed to delete message {}", message.message_id))?;
        Ok(())
    }
}
