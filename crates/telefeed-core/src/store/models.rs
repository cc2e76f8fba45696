//! Row types returned by the state store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ChatId, UserId};

/// Convert stored Unix milliseconds to a UTC timestamp.
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct License {
    pub user_id: UserId,
    pub license_code: String,
    pub validated_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub user_id: UserId,
    pub phone_number: String,
    pub connected_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Redirection {
    pub id: i64,
    pub user_id: UserId,
    pub phone_number: String,
    pub source_chat_id: ChatId,
    pub destination_chat_id: ChatId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A content-modification rule. `settings` is opaque to the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transformation {
    pub id: i64,
    pub user_id: UserId,
    pub phone_number: String,
    pub transformation_type: String,
    pub settings: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Which filter collection a row belongs to.
///
/// Whitelist and blacklist share a shape but live in separate tables; how they
/// combine is up to the message-processing rule engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterList {
    Whitelist,
    Blacklist,
}

impl FilterList {
    pub fn table(self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist_filters",
            Self::Blacklist => "blacklist_filters",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub id: i64,
    pub list: FilterList,
    pub user_id: UserId,
    pub phone_number: String,
    pub filter_name: String,
    pub filter_value: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Session metadata for a connected phone. `session_file` is a transport handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub phone_number: String,
    pub session_file: String,
    pub last_activity: DateTime<Utc>,
    pub active: bool,
}
