use backend::config::Config;
use backend::errors::{internal, ApiError};
use backend::state::AppState;
use backend::{api, db};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();

    // Ledger state lives under DATA_DIR (ignored by git).
    std::fs::create_dir_all(&config.data_dir).map_err(internal)?;

    let db = db::connect(&config.database_url()).await?;
    db::init_schema(&db).await?;

    let addr = config.addr.clone();
    let state = AppState::new(db, config);

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(internal)?;

    tracing::info!(%addr, "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(internal)?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
