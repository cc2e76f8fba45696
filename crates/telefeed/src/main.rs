use std::{net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;

use telefeed_core::{
    config::Config,
    control::ControlPlane,
    liveness::{BotApiNotifier, HttpProbe, LivenessConfig, LivenessMonitor, OperatorNotifier},
    messaging::{
        guarded::GuardedMessenger,
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    store::{StateStore, StoreConfig},
    Error,
};
use telefeed_http::AppState;
use telefeed_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<(), Error> {
    telefeed_core::logging::init("telefeed")?;

    let cfg = Config::load()?;

    let store = StateStore::connect(
        StoreConfig::new(cfg.database_url.clone()).max_connections(cfg.database_max_connections),
    )
    .await?;
    store.migrate().await?;

    let telegram: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::from_token(cfg.bot_token.clone()));
    let messenger = Arc::new(ThrottledMessenger::new(telegram, ThrottleConfig::default()));
    let control =
        ControlPlane::new(store.clone(), cfg.admin_id).with_messenger(GuardedMessenger::new(messenger));

    let shutdown = CancellationToken::new();
    let liveness = if cfg.liveness_enabled {
        Some(build_liveness(&cfg, shutdown.child_token())?)
    } else {
        tracing::info!("liveness subsystem disabled");
        None
    };

    let state = AppState {
        control,
        liveness: liveness.clone(),
        server_url: cfg.server_url.clone(),
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let mut http = tokio::spawn(telefeed_http::serve(addr, state, shutdown.clone()));
    let liveness_task = liveness.map(|monitor| tokio::spawn(async move { monitor.run().await }));

    let early = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => tracing::info!("ctrl-c received; shutting down"),
                Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c; shutting down"),
            }
            None
        }
        res = &mut http => Some(res),
    };

    shutdown.cancel();
    let http_result = match early {
        Some(res) => res,
        None => http.await,
    };
    if let Some(task) = liveness_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "liveness task failed");
        }
    }
    store.close().await;

    match http_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::External(format!("http server failed: {e:#}"))),
        Err(e) => Err(Error::External(format!("http server task failed: {e}"))),
    }
}

fn build_liveness(cfg: &Config, cancel: CancellationToken) -> Result<LivenessMonitor, Error> {
    let notifier = match cfg.admin_id {
        Some(admin) => {
            let n: Arc<dyn OperatorNotifier> = Arc::new(BotApiNotifier::new(cfg.bot_token.clone(), admin)?);
            Some(n)
        }
        None => None,
    };

    Ok(LivenessMonitor::new(
        LivenessConfig::new(cfg.server_url.clone()),
        Arc::new(HttpProbe::new()?),
        notifier,
        cancel,
    ))
}
