use anyhow::{Context, Result};
use ledgerstream::bridge;
use ledgerstream::config::Config;
use ledgerstream::context::AppContext;
use ledgerstream::db;
use ledgerstream::fanout::FanoutManager;
use ledgerstream::queue::WorkQueue;
use ledgerstream::routes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Connecting to database at: {}",
        Config::mask_url(&config.database_url)
    );
    let db_pool = db::create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Connected to database");

    info!(
        "Connecting to Redis at: {}",
        Config::mask_url(&config.redis_url)
    );
    let queue = Arc::new(Mutex::new(WorkQueue::new(&config).await?));
    info!("Connected to Redis");

    let fanout = Arc::new(FanoutManager::new());

    // Bridge subscriber: worker-published events land in this instance's
    // fan-out registry.
    tokio::spawn(bridge::run_event_subscriber(
        config.redis_url.clone(),
        config.events_channel.clone(),
        fanout.clone(),
    ));

    let config = Arc::new(config);
    let app_context = Arc::new(AppContext::new(
        db_pool,
        queue,
        fanout,
        config.clone(),
    ));

    let app = routes::create_router(app_context);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("ledgerstream server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
