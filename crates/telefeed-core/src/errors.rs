use crate::failure::FailureKind;

/// Core error type for TeleFeed.
///
/// Adapter crates should map their specific errors into this type so the core
/// can classify transport failures and report store failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(String),

    /// Failure reported by the messaging transport.
    ///
    /// `kind` is set when the adapter could map a structured error; otherwise
    /// classification falls back to the message text.
    #[error("transport error: {message}")]
    Transport {
        kind: Option<FailureKind>,
        message: String,
    },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: None,
            message: message.into(),
        }
    }

    pub fn transport_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind: Some(kind),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
