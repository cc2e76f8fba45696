use std::{env, fs, path::Path};

use crate::{domain::UserId, errors::Error, Result};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:10000";
pub const DEFAULT_PORT: u16 = 10000;

/// Typed configuration read from the process environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    /// Operator identity: always licensed, receives liveness notifications.
    pub admin_id: Option<UserId>,

    // HTTP surface
    pub server_url: String,
    pub port: u16,

    // Storage
    pub database_url: String,
    pub database_max_connections: u32,

    // Behavior flags
    pub liveness_enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build the config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Required vars
        let bot_token = lookup("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let database_url = lookup("DATABASE_URL").and_then(non_empty).ok_or_else(|| {
            Error::Config("DATABASE_URL environment variable is required".to_string())
        })?;

        let admin_id = match lookup("ADMIN_ID").and_then(non_empty) {
            Some(raw) => Some(UserId(raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("ADMIN_ID must be a numeric user id, got {raw:?}"))
            })?)),
            None => None,
        };

        let server_url = lookup("SERVER_URL")
            .and_then(non_empty)
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let port = match lookup("PORT").and_then(non_empty) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a valid port, got {raw:?}")))?,
            None => DEFAULT_PORT,
        };

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(5);

        let liveness_enabled = lookup("LIVENESS_ENABLED")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        Ok(Self {
            bot_token,
            admin_id,
            server_url,
            port,
            database_url,
            database_max_connections,
            liveness_enabled,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
