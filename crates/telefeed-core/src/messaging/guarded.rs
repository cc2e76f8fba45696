use std::sync::Arc;

use crate::{
    domain::{ChatId, MessageRef},
    failure::{guarded, Guarded},
    messaging::{
        port::MessagingPort,
        types::{EntityInfo, TextFormat},
    },
};

/// Messenger whose every call goes through the failure classifier.
///
/// Failures never surface as errors; callers get `Guarded::Classified` after
/// the kind's cooldown (if any) has elapsed.
#[derive(Clone)]
pub struct GuardedMessenger {
    inner: Arc<dyn MessagingPort>,
}

impl GuardedMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>) -> Self {
        Self { inner }
    }

    pub async fn resolve_entity(&self, chat_id: ChatId) -> Guarded<EntityInfo> {
        guarded("resolve_entity", || self.inner.resolve_entity(chat_id)).await
    }

    pub async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Guarded<MessageRef> {
        guarded("send_text", || self.inner.send_text(chat_id, text, format)).await
    }

    pub async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Guarded<MessageRef> {
        guarded("forward_message", || self.inner.forward_message(to, msg)).await
    }

    pub async fn edit_text(&self, msg: MessageRef, text: &str) -> Guarded<()> {
        guarded("edit_text", || self.inner.edit_text(msg, text)).await
    }

    pub async fn delete_message(&self, msg: MessageRef) -> Guarded<()> {
        guarded("delete_message", || self.inner.delete_message(msg)).await
    }
}
