use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    domain::UserId,
    errors::Error,
    failure::{classify_message, FailureKind},
    Result,
};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one-shot status messages to the operator.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Sends Markdown messages to one chat through the Bot API `sendMessage` call.
#[derive(Clone)]
pub struct BotApiNotifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: UserId,
}

#[derive(Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}

impl BotApiNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: UserId) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id,
        })
    }

    /// Point at a different Bot API server (self-hosted or local).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl OperatorNotifier for BotApiNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id.0,
            "text": text,
            "parse_mode": "Markdown",
        });

        // The URL embeds the bot token; never let it reach the logs.
        let resp = self
            .http
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::transport_kind(FailureKind::NetworkTransient, e.without_url().to_string())
            })?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!(chat_id = self.chat_id.0, "operator notified");
            return Ok(());
        }

        let description = resp
            .json::<ApiReply>()
            .await
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_else(|| status.to_string());
        Err(Error::transport_kind(
            kind_for_status(status.as_u16(), &description),
            format!("sendMessage failed ({status}): {description}"),
        ))
    }
}

fn kind_for_status(status: u16, description: &str) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        401 | 403 => FailureKind::AccessDenied,
        _ => classify_message(description),
    }
}

/// Markdown body of the post-deploy notification.
pub fn startup_message(server_url: &str, deployed_at: DateTime<Utc>) -> String {
    format!(
        "🚀 *DEPLOYMENT SUCCESSFUL*\n\
\n\
✅ TeleFeed is up and running\n\
🌐 Server URL: {server_url}\n\
⏰ Deployed: {} UTC\n\
\n\
🔄 *Subsystem status:*\n\
• HTTP server: ✅ Operational\n\
• Keep-alive ping: ✅ Active\n\
• Health monitor: ✅ Configured\n\
\n\
🎯 Redirections are live and keep-alive runs automatically.",
        deployed_at.format("%d/%m/%Y %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn startup_message_mentions_url_and_checklist() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        let msg = startup_message("https://telefeed.example.com", at);

        assert!(msg.contains("https://telefeed.example.com"));
        assert!(msg.contains("01/03/2026 09:05:07 UTC"));
        assert!(msg.contains("HTTP server"));
        assert!(msg.contains("Health monitor"));
    }

    #[test]
    fn status_codes_map_to_failure_kinds() {
        assert_eq!(kind_for_status(429, "Too Many Requests: retry after 3"), FailureKind::RateLimited);
        assert_eq!(kind_for_status(403, "Forbidden: bot was blocked by the user"), FailureKind::AccessDenied);
        assert_eq!(kind_for_status(400, "Bad Request: chat not found"), FailureKind::EntityNotFound);
        assert_eq!(kind_for_status(500, "Internal Server Error"), FailureKind::Unclassified);
    }

    mod bot_api {
        use super::*;
        use std::sync::{Arc, Mutex};

        use axum::{
            extract::State,
            http::{Method, StatusCode, Uri},
            Json, Router,
        };
        use serde_json::{json, Value};

        type Seen = Arc<Mutex<Vec<(Method, String, Value)>>>;

        /// Local Bot API stand-in answering every request with `status` and `reply`.
        async fn serve_stub(status: StatusCode, reply: Value) -> (String, Seen) {
            let seen: Seen = Arc::new(Mutex::new(Vec::new()));
            let app = Router::new()
                .fallback(
                    move |State(seen): State<Seen>, method: Method, uri: Uri, Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            seen.lock().unwrap().push((method, uri.path().to_string(), body));
                            (status, Json(reply))
                        }
                    },
                )
                .with_state(seen.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}"), seen)
        }

        #[tokio::test]
        async fn posts_markdown_message_to_operator() {
            let (base, seen) = serve_stub(StatusCode::OK, json!({ "ok": true, "result": {} })).await;
            let notifier = BotApiNotifier::new("123:abc", UserId(42))
                .unwrap()
                .with_api_base(base);

            notifier.notify("*deployed*").await.unwrap();

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            let (method, path, body) = &seen[0];
            assert_eq!(*method, Method::POST);
            assert_eq!(path.as_str(), "/bot123:abc/sendMessage");
            assert_eq!(
                body,
                &json!({ "chat_id": 42, "text": "*deployed*", "parse_mode": "Markdown" })
            );
        }

        #[tokio::test]
        async fn rate_limited_reply_is_classified() {
            let (base, _seen) = serve_stub(
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 3"
                }),
            )
            .await;
            let notifier = BotApiNotifier::new("123:abc", UserId(42))
                .unwrap()
                .with_api_base(base);

            let err = notifier.notify("hi").await.unwrap_err();

            match err {
                Error::Transport { kind, message } => {
                    assert_eq!(kind, Some(FailureKind::RateLimited));
                    assert!(message.contains("retry after 3"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn unreachable_api_is_network_transient() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let notifier = BotApiNotifier::new("123:abc", UserId(42))
                .unwrap()
                .with_api_base(format!("http://{addr}"));

            let err = notifier.notify("hi").await.unwrap_err();
            assert!(matches!(
                err,
                Error::Transport {
                    kind: Some(FailureKind::NetworkTransient),
                    ..
                }
            ));
        }
    }

    #[test]
    fn api_base_is_normalized() {
        let n = BotApiNotifier::new("123:abc", UserId(1))
            .unwrap()
            .with_api_base("http://localhost:8081/");
        assert_eq!(n.send_message_url(), "http://localhost:8081/bot123:abc/sendMessage");
    }
}
