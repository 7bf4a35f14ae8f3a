//! Transaction worker: consumes the durable work queue and drives
//! transactions to a terminal state.
//!
//! Run any number of these alongside the server; the BRPOP consumption gives
//! each work item to exactly one worker, and the pending-only status guard
//! keeps a redelivered item from double-processing a transaction.

use anyhow::{Context, Result};
use ledgerstream::config::Config;
use ledgerstream::db;
use ledgerstream::queue::WorkQueue;
use ledgerstream::worker::{process_work_item, ProcessOutcome, SimulatedPolicy, WorkerState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
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
    let pool = db::create_pool(&config)
        .await
        .context("Failed to connect to database")?;

    info!(
        "Connecting to Redis at: {}",
        Config::mask_url(&config.redis_url)
    );
    let queue = Arc::new(Mutex::new(WorkQueue::new(&config).await?));

    let state = WorkerState {
        pool,
        queue,
        policy: Arc::new(SimulatedPolicy::new(&config.worker)),
    };

    info!(
        queue = %config.work_queue_key,
        events_channel = %config.events_channel,
        "Transaction worker started, waiting for work items"
    );

    let poll_timeout = config.worker.poll_timeout_secs;
    loop {
        let item = match state.queue.lock().await.pop_work(poll_timeout).await {
            Ok(Some(item)) => item,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Failed to poll work queue, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        match process_work_item(&state, &item).await {
            Ok(ProcessOutcome::Completed) => {
                info!(task_id = %item.task_id, "Work item completed");
            }
            Ok(ProcessOutcome::Failed) => {
                info!(task_id = %item.task_id, "Work item ended in modeled failure");
            }
            Ok(ProcessOutcome::NotFound) => {
                info!(task_id = %item.task_id, "Work item referenced a missing transaction");
            }
            Ok(ProcessOutcome::Skipped) => {
                info!(task_id = %item.task_id, "Work item skipped");
            }
            // Infrastructure error with no state transition; the next queue
            // item is unaffected.
            Err(e) => {
                error!(
                    task_id = %item.task_id,
                    transaction_id = item.transaction_id,
                    error = %e,
                    "Work item failed without a state transition"
                );
            }
        }
    }
}
