use dotenv::dotenv;
use std::sync::Arc;
use stocklet_core::auth::{AuthService, Denylist, PgDenylist, TokenService};
use stocklet_core::config::Config;
use stocklet_core::db::Database;
use stocklet_core::web::create_router;
use stocklet_core::worker::PurgeScheduler;
use stocklet_core::AppState;
use tokio::signal;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Stocklet server...");

    let config = Config::from_env()?;
    let database = Database::connect(&config.database_url, config.database_max_connections).await?;

    let denylist: Arc<dyn Denylist> = Arc::new(PgDenylist::new(database.pool()));
    let tokens = TokenService::new(&config.jwt_secret, &config.jwt_issuer, &config.jwt_audience);
    let auth = AuthService::new(tokens, denylist.clone(), config.cookie_secure);

    // Revoked tokens are only kept until their own expiry
    let scheduler = PurgeScheduler::new(denylist, Some(config.purge_interval_seconds));
    let runner = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = runner.start().await {
            tracing::error!("Purge scheduler error: {}", e);
        }
    });

    let bind_address = config.bind_address();
    let state = AppState {
        db: database.pool(),
        auth,
        config: Arc::new(config),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_address, e))?;

    info!("Server listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    scheduler.stop().await;
    if let Err(e) = scheduler_handle.await {
        tracing::error!("Purge scheduler task failed: {}", e);
    }
    database.close().await;

    info!("Stocklet server stopped");
    Ok(())
}
