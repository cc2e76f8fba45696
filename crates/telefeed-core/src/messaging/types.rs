use crate::domain::ChatId;

/// What a resolved chat id turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Group,
    Channel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: ChatId,
    pub kind: EntityKind,
    /// Title for groups/channels, display name for users.
    pub title: Option<String>,
}

/// Markup applied to outgoing text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
    MarkdownV2,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_forward: bool,
    pub supports_edit: bool,
    pub supports_delete: bool,
    pub max_message_len: usize,
}
