use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod auth;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botfleet_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path via BOTFLEET_CONFIG > ~/.botfleet/botfleet.toml
    let config_path = std::env::var("BOTFLEET_CONFIG").ok();
    let config = botfleet_core::config::FleetConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            botfleet_core::config::FleetConfig::default()
        });

    // A broken store is fatal: exit 1 via the error return.
    let store = botfleet_store::Store::open(&config.database.path)?;
    botfleet_store::seed::seed(&store)?;
    // No workers exist yet, so no row may claim one.
    store.reset_all_running()?;

    let bind = config.server.bind.clone();
    let port = config.server.port;
    let state = Arc::new(app::AppState::new(config, store));
    let router = app::build_router(state.clone());

    // Restore operator intent in the background; each start sleeps before
    // opening its poll, so this must not delay the admin API.
    {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = state.supervisor.clone().resume_active(&state).await {
                tracing::error!("failed to resume active bots: {e}");
            }
        });
    }

    // is_running drift repair.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(botfleet_supervisor::reconcile::run_reconciler(
        state.clone(),
        shutdown_rx,
    ));

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("botfleet gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("termination signal received");
        })
        .await?;

    // Graceful teardown: workers first, then the periodic tasks; the store
    // closes when the process exits.
    state.supervisor.clone().shutdown_all(&state).await;
    let _ = shutdown_tx.send(true);
    info!("shutdown complete");

    Ok(())
}
