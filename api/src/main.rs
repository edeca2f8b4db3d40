use lovenote_api::config::Config;
use lovenote_api::handlers::AppState;
use lovenote_api::router::router;
use lovenote_api::store::SqlxProposalStore;
use lovenote_api::telemetry;
use lovenote_mailer::SmtpNotifier;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    telemetry::init(config.mode)?;

    let connect_options =
        PgConnectOptions::from_str(&config.database_url)?.database(&config.database_name);
    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = %config.database_name, "Postgres connected");

    let notifier = SmtpNotifier::new(&config.relay)?;
    let state = Arc::new(AppState::new(
        SqlxProposalStore::new(pg_pool.clone()),
        notifier,
    ));
    let app = router(state, &config.front())?;

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Ready on http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down server...");
    pg_pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
