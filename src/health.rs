use crate::db::{self, DbPool};
use crate::queue::WorkQueue;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Probes the store and the queue; either one failing marks the service
/// unavailable.
pub async fn health_check(pool: &DbPool, queue: Arc<Mutex<WorkQueue>>) -> Result<()> {
    db::ping(pool).await.context("Database ping failed")?;
    queue
        .lock()
        .await
        .ping()
        .await
        .context("Redis ping failed")?;
    Ok(())
}
