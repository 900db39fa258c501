use everlock::{
    config::AppConfig,
    db::{self, SqliteGateway},
    web, Engine,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "everlock=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Everlock v{}", env!("CARGO_PKG_VERSION"));

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    let config = AppConfig::init()?;
    info!("Configuration loaded");

    // Initialize database
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;
    info!("Database connected: {}", config.database.url);

    // Run migrations
    db::init_db(&pool).await?;

    let policy = config.lifecycle.policy();
    let engine = Arc::new(Engine::new(
        Arc::new(SqliteGateway::new(pool.clone())),
        policy,
    ));
    info!(
        wipe_shares_on_success = policy.wipe_shares_on_success,
        "Lifecycle engine ready"
    );

    let app = web::create_router(web::AppState { engine });

    let web_addr = config.web_addr();
    let listener = TcpListener::bind(&web_addr).await?;
    info!("Web server listening on http://{}", web_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Web server error: {}", e);
        return Err(e.into());
    }

    pool.close().await;
    info!("Everlock shut down gracefully");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
