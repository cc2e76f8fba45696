use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{EntityInfo, MessagingCapabilities, TextFormat},
    Result,
};

/// Transport port.
///
/// Covers the capability set the core relies on: entity lookup, send, forward,
/// edit and delete. Implementations should report failures as
/// [`crate::Error::Transport`], setting the kind when their native error is
/// structured enough to map directly.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn resolve_entity(&self, chat_id: ChatId) -> Result<EntityInfo>;

    async fn send_text(&self, chat_id: ChatId, text: &str, format: TextFormat)
        -> Result<MessageRef>;

    /// Copy `msg` into `to`, returning the new message.
    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;
}
