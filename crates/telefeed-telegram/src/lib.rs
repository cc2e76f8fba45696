//! Telegram adapter (teloxide).
//!
//! This crate implements the `telefeed-core` MessagingPort over the Telegram
//! Bot API. Errors are mapped to core failure kinds here, where teloxide still
//! exposes them as structured values.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

use telefeed_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    failure::FailureKind,
    messaging::{
        port::MessagingPort,
        types::{EntityInfo, EntityKind, MessagingCapabilities, TextFormat},
    },
    Result,
};

/// Telegram's hard limit on text message length.
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(Bot::new(token))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn parse_mode(format: TextFormat) -> Option<ParseMode> {
        match format {
            TextFormat::Plain => None,
            TextFormat::Html => Some(ParseMode::Html),
            TextFormat::MarkdownV2 => Some(ParseMode::MarkdownV2),
        }
    }

    fn map_err(e: RequestError) -> Error {
        let message = format!("telegram error: {e}");
        match failure_kind(&e) {
            Some(kind) => Error::transport_kind(kind, message),
            None => Error::transport(message),
        }
    }
}

/// Structured mapping of teloxide errors; `None` leaves classification to the
/// message text.
pub fn failure_kind(e: &RequestError) -> Option<FailureKind> {
    match e {
        RequestError::RetryAfter(_) => Some(FailureKind::RateLimited),
        RequestError::Network(_) | RequestError::Io(_) => Some(FailureKind::NetworkTransient),
        RequestError::Api(api) => match api {
            ApiError::ChatNotFound | ApiError::UserNotFound => Some(FailureKind::EntityNotFound),
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated => Some(FailureKind::AccessDenied),
            _ => None,
        },
        _ => None,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_forward: true,
            supports_edit: true,
            supports_delete: true,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    async fn resolve_entity(&self, chat_id: ChatId) -> Result<EntityInfo> {
        let chat = self
            .bot
            .get_chat(Self::tg_chat(chat_id))
            .await
            .map_err(Self::map_err)?;

        let kind = if chat.is_private() {
            EntityKind::User
        } else if chat.is_channel() {
            EntityKind::Channel
        } else {
            EntityKind::Group
        };
        let title = chat
            .title()
            .or_else(|| chat.first_name())
            .map(str::to_string);

        tracing::debug!(chat_id = chat_id.0, ?kind, "entity resolved");
        Ok(EntityInfo {
            id: chat_id,
            kind,
            title,
        })
    }

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef> {
        let mut req = self
            .bot
            .send_message(Self::tg_chat(chat_id), text.to_string());
        if let Some(mode) = Self::parse_mode(format) {
            req = req.parse_mode(mode);
        }
        let msg = req.await.map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        let sent = self
            .bot
            .forward_message(
                Self::tg_chat(to),
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id: to,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
