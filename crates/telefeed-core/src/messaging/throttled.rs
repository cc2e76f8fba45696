use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{EntityInfo, MessagingCapabilities, TextFormat},
    },
    Result,
};

/// Destinations tracked before stale entries are pruned.
const PRUNE_AT: usize = 1024;

/// Pacing applied to relay traffic.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Spacing between any two bot calls. A fan-out to N destinations takes
    /// at least N times this.
    pub global_min_interval: Duration,
    /// Spacing between two posts into the same destination chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            // The Bot API tolerates ~30 broadcast messages per second.
            global_min_interval: Duration::from_millis(35),
            per_chat_min_interval: Duration::from_secs(1),
        }
    }
}

/// Next free slot, overall and per destination.
#[derive(Debug)]
struct Schedule {
    next_any: Instant,
    next_for: HashMap<ChatId, Instant>,
}

impl Schedule {
    fn new() -> Self {
        Self {
            next_any: Instant::now(),
            next_for: HashMap::new(),
        }
    }

    /// Book the earliest start honouring both spacings; `chat` is `None` for
    /// calls that post nothing.
    fn book(&mut self, now: Instant, chat: Option<ChatId>, cfg: &ThrottleConfig) -> Instant {
        if self.next_for.len() >= PRUNE_AT {
            self.next_for.retain(|_, next| *next > now);
        }

        let mut start = now.max(self.next_any);
        if let Some(chat) = chat {
            if let Some(next) = self.next_for.get(&chat) {
                start = start.max(*next);
            }
            self.next_for.insert(chat, start + cfg.per_chat_min_interval);
        }
        self.next_any = start + cfg.global_min_interval;
        start
    }
}

/// MessagingPort decorator that paces outbound calls.
///
/// Redirections fan one source message out to many destinations; pacing the
/// burst keeps the guarded layer from hitting its rate-limit cooldown.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    schedule: Mutex<Schedule>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            schedule: Mutex::new(Schedule::new()),
        }
    }

    async fn pace(&self, chat: Option<ChatId>) {
        let start = {
            self.schedule
                .lock()
                .await
                .book(Instant::now(), chat, &self.cfg)
        };
        sleep_until(start).await;
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn resolve_entity(&self, chat_id: ChatId) -> Result<EntityInfo> {
        // Lookups post nothing; only the global spacing applies.
        self.pace(None).await;
        self.inner.resolve_entity(chat_id).await
    }

    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef> {
        self.pace(Some(chat_id)).await;
        self.inner.send_text(chat_id, text, format).await
    }

    async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
        self.pace(Some(to)).await;
        self.inner.forward_message(to, msg).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.pace(Some(msg.chat_id)).await;
        self.inner.edit_text(msg, text).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.pace(Some(msg.chat_id)).await;
        self.inner.delete_message(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use crate::messaging::types::EntityKind;

    struct NullMessenger;

    #[async_trait::async_trait]
    impl MessagingPort for NullMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_forward: true,
                supports_edit: true,
                supports_delete: true,
                max_message_len: 4096,
            }
        }

        async fn resolve_entity(&self, chat_id: ChatId) -> Result<EntityInfo> {
            Ok(EntityInfo {
                id: chat_id,
                kind: EntityKind::Channel,
                title: None,
            })
        }

        async fn send_text(&self, chat_id: ChatId, _: &str, _: TextFormat) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn forward_message(&self, to: ChatId, msg: MessageRef) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id: to,
                message_id: msg.message_id,
            })
        }

        async fn edit_text(&self, _: MessageRef, _: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _: MessageRef) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn same_chat_calls_are_spaced_per_chat_interval() {
        let cfg = ThrottleConfig::default();
        let m = ThrottledMessenger::new(Arc::new(NullMessenger), cfg);

        let start = Instant::now();
        m.send_text(ChatId(5), "a", TextFormat::Plain).await.unwrap();
        m.send_text(ChatId(5), "b", TextFormat::Plain).await.unwrap();

        assert!(start.elapsed() >= cfg.per_chat_min_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn different_chats_only_pay_global_interval() {
        let cfg = ThrottleConfig::default();
        let m = ThrottledMessenger::new(Arc::new(NullMessenger), cfg);

        let start = Instant::now();
        m.send_text(ChatId(1), "a", TextFormat::Plain).await.unwrap();
        m.send_text(ChatId(2), "b", TextFormat::Plain).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= cfg.global_min_interval);
        assert!(elapsed < cfg.per_chat_min_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_is_paced_by_global_interval() {
        let cfg = ThrottleConfig::default();
        let m = ThrottledMessenger::new(Arc::new(NullMessenger), cfg);
        let source = MessageRef {
            chat_id: ChatId(-100),
            message_id: MessageId(7),
        };

        let start = Instant::now();
        for dest in [-201, -202, -203] {
            m.forward_message(ChatId(dest), source).await.unwrap();
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= cfg.global_min_interval * 2);
        assert!(elapsed < cfg.per_chat_min_interval);
    }

    #[tokio::test]
    async fn stale_destinations_are_pruned() {
        let cfg = ThrottleConfig::default();
        let mut schedule = Schedule::new();
        let now = Instant::now();
        for id in 0..PRUNE_AT as i64 {
            schedule.next_for.insert(ChatId(id), now);
        }

        schedule.book(now + Duration::from_secs(5), Some(ChatId(-1)), &cfg);

        assert_eq!(schedule.next_for.len(), 1);
    }
}
