//! Transport failure classification.
//!
//! Every messaging action goes through [`guarded`], which maps the transport's
//! error surface onto a fixed taxonomy and applies a per-kind policy: log at a
//! fixed level, optionally sleep a fixed cooldown, then hand back an empty
//! outcome. Callers are written to tolerate no-op results, so nothing here
//! propagates an error.

use std::{fmt, future::Future, time::Duration};

use serde::Serialize;
use tokio::time::sleep;

use crate::errors::Error;

/// Cooldown applied once after a transient network failure.
pub const NETWORK_COOLDOWN: Duration = Duration::from_secs(5);
/// Cooldown applied once after the transport throttled us.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Target chat/user cannot be resolved.
    EntityNotFound,
    /// Caller lacks permission to read or act on the target.
    AccessDenied,
    /// Connection reset / generic network failure.
    NetworkTransient,
    /// Flood control / too many requests.
    RateLimited,
    /// "Peer user" class of error carrying an internal code.
    PeerResolution,
    Unclassified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

impl FailureKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::NetworkTransient | Self::Unclassified => Severity::Error,
            Self::EntityNotFound | Self::AccessDenied | Self::RateLimited | Self::PeerResolution => {
                Severity::Warn
            }
        }
    }

    /// Fixed sleep applied once before the guarded call returns. Not a backoff.
    pub fn cooldown(self) -> Option<Duration> {
        match self {
            Self::NetworkTransient => Some(NETWORK_COOLDOWN),
            Self::RateLimited => Some(RATE_LIMIT_COOLDOWN),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityNotFound => "entity_not_found",
            Self::AccessDenied => "access_denied",
            Self::NetworkTransient => "network_transient",
            Self::RateLimited => "rate_limited",
            Self::PeerResolution => "peer_resolution",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text fallback for transports that only surface a message.
///
/// Rules are checked in order; the first match wins.
pub fn classify_message(msg: &str) -> FailureKind {
    let lower = msg.to_lowercase();

    if msg.contains("Could not find the input entity")
        || lower.contains("chat not found")
        || lower.contains("user not found")
    {
        return FailureKind::EntityNotFound;
    }
    if msg.contains("You can't retrieve the information") || msg.contains("Forbidden") {
        return FailureKind::AccessDenied;
    }
    if msg.contains("Network error") || msg.contains("Connection reset") {
        return FailureKind::NetworkTransient;
    }
    if msg.contains("Too Many Requests") || msg.contains("FLOOD_WAIT") {
        return FailureKind::RateLimited;
    }
    if msg.contains("PeerUser") && msg.contains("100") {
        return FailureKind::PeerResolution;
    }
    FailureKind::Unclassified
}

/// Adapter seam: an error that knows which failure kind it belongs to.
///
/// Transports with a structured error hierarchy should map it directly; the
/// default falls back to [`classify_message`].
pub trait TransportFailure: fmt::Display + fmt::Debug {
    fn failure_kind(&self) -> FailureKind {
        classify_message(&self.to_string())
    }
}

impl TransportFailure for Error {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Transport {
                kind: Some(kind), ..
            } => *kind,
            Error::Transport {
                kind: None,
                message,
            } => classify_message(message),
            other => classify_message(&other.to_string()),
        }
    }
}

/// Outcome of a guarded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    Ok(T),
    Classified(FailureKind),
}

impl<T> Guarded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Classified(_) => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Ok(_) => None,
            Self::Classified(k) => Some(*k),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Guarded<U> {
        match self {
            Self::Ok(v) => Guarded::Ok(f(v)),
            Self::Classified(k) => Guarded::Classified(k),
        }
    }
}

/// Run `op`, classifying any failure.
///
/// `label` names the operation in logs (e.g. `"send_text"`).
pub async fn guarded<T, E, F, Fut>(label: &str, op: F) -> Guarded<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: TransportFailure,
{
    let err = match op().await {
        Ok(v) => return Guarded::Ok(v),
        Err(e) => e,
    };

    let kind = err.failure_kind();
    match (kind, kind.severity()) {
        (FailureKind::Unclassified, _) => {
            tracing::error!(operation = label, kind = %kind, error = %err, detail = ?err, "unexpected transport error");
        }
        (_, Severity::Error) => {
            tracing::error!(operation = label, kind = %kind, error = %err, "transport error");
        }
        (_, Severity::Warn) => {
            tracing::warn!(operation = label, kind = %kind, error = %err, "transport error");
        }
    }

    if let Some(cooldown) = kind.cooldown() {
        sleep(cooldown).await;
    }

    Guarded::Classified(kind)
}
