//! Self-liveness subsystem.
//!
//! Three independent background tasks keep the hosted process awake and
//! report on it:
//! - a one-shot startup notification to the operator,
//! - a keep-alive loop that pings the service's own `/ping` endpoint,
//! - a health monitor that checks `/health` and hits `/wake-up` on failure.
//!
//! Every task observes the same [`CancellationToken`]; after cancellation no
//! new probe is issued, but an in-flight call is allowed to finish.

pub mod notifier;
pub mod probe;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{failure::guarded, Error, Result};

pub use notifier::{startup_message, BotApiNotifier, OperatorNotifier};
pub use probe::{EndpointProbe, HttpProbe};

#[derive(Clone, Debug)]
pub struct LivenessConfig {
    /// Base URL of the service's own HTTP surface, without trailing slash.
    pub server_url: String,
    pub startup_delay: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    /// Wait after a failed ping, instead of `ping_interval`.
    pub ping_cooldown: Duration,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub wake_timeout: Duration,
    /// Wait after a health round aborted unexpectedly, instead of `health_interval`.
    pub health_cooldown: Duration,
}

impl LivenessConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            startup_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(10),
            ping_cooldown: Duration::from_secs(30),
            health_interval: Duration::from_secs(300),
            health_timeout: Duration::from_secs(5),
            wake_timeout: Duration::from_secs(10),
            health_cooldown: Duration::from_secs(60),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LivenessStatus {
    pub active: bool,
    pub server_url: String,
    pub started_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct LivenessMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    cfg: LivenessConfig,
    probe: Arc<dyn EndpointProbe>,
    notifier: Option<Arc<dyn OperatorNotifier>>,
    cancel: CancellationToken,
    running: AtomicBool,
    started_at: DateTime<Utc>,
    last_ping: Mutex<Option<DateTime<Utc>>>,
}

impl LivenessMonitor {
    /// `notifier` is `None` when no operator is configured; the startup
    /// notification is then skipped.
    pub fn new(
        cfg: LivenessConfig,
        probe: Arc<dyn EndpointProbe>,
        notifier: Option<Arc<dyn OperatorNotifier>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                cfg,
                probe,
                notifier,
                cancel,
                running: AtomicBool::new(false),
                started_at: Utc::now(),
                last_ping: Mutex::new(None),
            }),
        }
    }

    /// Spawn the three tasks and wait until all of them have exited.
    ///
    /// A task that panics is logged; its siblings keep running.
    pub async fn run(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        tracing::info!(server_url = %self.inner.cfg.server_url, "liveness subsystem started");

        let notify = tokio::spawn(notify_startup(self.inner.clone(), self.inner.cancel.clone()));
        let ping = tokio::spawn(ping_loop(self.inner.clone(), self.inner.cancel.clone()));
        let health = tokio::spawn(health_monitor(self.inner.clone(), self.inner.cancel.clone()));

        let (notify, ping, health) = tokio::join!(notify, ping, health);
        for (task, res) in [("startup_notify", notify), ("keep_alive", ping), ("health_monitor", health)] {
            if let Err(e) = res {
                tracing::error!(task, error = %e, "liveness task aborted");
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("liveness subsystem stopped");
    }

    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    pub fn status(&self) -> LivenessStatus {
        LivenessStatus {
            active: self.inner.running.load(Ordering::SeqCst) && !self.inner.cancel.is_cancelled(),
            server_url: self.inner.cfg.server_url.clone(),
            started_at: self.inner.started_at,
            last_ping: self.inner.last_ping.lock().ok().and_then(|g| *g),
        }
    }
}

/// Returns `false` if cancelled before `wait` elapsed.
async fn pause(cancel: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(wait) => true,
    }
}

async fn notify_startup(inner: Arc<MonitorInner>, cancel: CancellationToken) {
    let Some(notifier) = inner.notifier.clone() else {
        tracing::warn!("no operator configured; skipping startup notification");
        return;
    };
    if !pause(&cancel, inner.cfg.startup_delay).await {
        return;
    }

    let text = startup_message(&inner.cfg.server_url, Utc::now());
    // One attempt only; the failure is logged by the guard.
    let _ = guarded("operator_notify", || notifier.notify(&text)).await;
}

async fn ping_loop(inner: Arc<MonitorInner>, cancel: CancellationToken) {
    let url = inner.cfg.endpoint("/ping");
    let mut wait = inner.cfg.ping_interval;

    while pause(&cancel, wait).await {
        match inner.probe.get(&url, inner.cfg.ping_timeout).await {
            Ok(status) => {
                tracing::debug!(status, "keep-alive ping");
                if let Ok(mut last) = inner.last_ping.lock() {
                    *last = Some(Utc::now());
                }
                wait = inner.cfg.ping_interval;
            }
            Err(e) => {
                tracing::debug!(error = %e, "keep-alive ping failed");
                wait = inner.cfg.ping_cooldown;
            }
        }
    }
}

async fn health_monitor(inner: Arc<MonitorInner>, cancel: CancellationToken) {
    let mut wait = inner.cfg.health_interval;

    while pause(&cancel, wait).await {
        // A failed wake-up is part of a normal round; only a round that dies
        // (panics) switches to the cooldown.
        wait = match tokio::spawn(health_round(inner.clone())).await {
            Ok(()) => inner.cfg.health_interval,
            Err(e) => {
                tracing::error!(error = %e, "health monitor error");
                inner.cfg.health_cooldown
            }
        };
    }
}

/// One check, plus at most one wake-up.
async fn health_round(inner: Arc<MonitorInner>) {
    if check_health(&inner).await {
        tracing::debug!("health check passed");
        return;
    }

    tracing::warn!("health check failed; sending wake-up");
    match wake_up(&inner).await {
        Ok(()) => tracing::info!("wake-up acknowledged"),
        Err(e) => tracing::error!(error = %e, "wake-up failed"),
    }
}

async fn check_health(inner: &MonitorInner) -> bool {
    match inner
        .probe
        .get(&inner.cfg.endpoint("/health"), inner.cfg.health_timeout)
        .await
    {
        Ok(status) => status == 200,
        Err(e) => {
            tracing::debug!(error = %e, "health probe failed");
            false
        }
    }
}

async fn wake_up(inner: &MonitorInner) -> Result<()> {
    let status = inner
        .probe
        .get(&inner.cfg.endpoint("/wake-up"), inner.cfg.wake_timeout)
        .await?;
    if status == 200 {
        Ok(())
    } else {
        Err(Error::Http(format!("wake-up returned status {status}")))
    }
}
