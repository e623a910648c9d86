use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use otmarket_api::auth::AuthService;
use otmarket_api::config::{init_tracing, load_config};
use otmarket_api::db::{establish_connection_from_app_config, run_migrations};
use otmarket_api::events::{process_events, EventSender};
use otmarket_api::services::gateway::HttpPaymentGateway;
use otmarket_api::services::AppServices;
use otmarket_api::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "Starting otmarket-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    if config.auto_migrate {
        run_migrations(&db).await.context("migrations failed")?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(process_events(event_rx));

    let gateway = Arc::new(
        HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_access_token.clone(),
            Duration::from_secs(config.gateway_timeout_secs),
        )
        .context("failed to build gateway client")?,
    );

    let services = AppServices::new(db.clone(), event_sender.clone(), gateway, &config);
    let auth_service = Arc::new(AuthService::new(&config.jwt_secret));

    spawn_expiry_sweep(&services, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        db,
        config,
        event_sender,
        services,
    });

    let app = app_router(state, auth_service);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Periodically cancels pending orders whose gateway session was abandoned.
fn spawn_expiry_sweep(services: &AppServices, config: &otmarket_api::config::AppConfig) {
    let orders = services.orders.clone();
    let max_age_hours = config.pending_order_expiry_hours;
    let interval = Duration::from_secs(config.expiry_sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match orders.expire_stale_pending_orders(max_age_hours).await {
                Ok(0) => {}
                Ok(n) => info!(expired = n, "expiry sweep cancelled stale orders"),
                Err(e) => error!(error = %e, "expiry sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
