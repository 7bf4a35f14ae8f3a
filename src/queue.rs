// ============================================================================
// Work Queue - Redis-backed dispatch and event publishing
// ============================================================================
//
// Two Redis structures back the asynchronous lifecycle:
//
// 1. A list (`work_queue_key`) holding serialized WorkItems. The dispatcher
//    LPUSHes, workers BRPOP, so each item is consumed by exactly one worker.
// 2. A pub/sub channel (`events_channel`) carrying transaction snapshots from
//    workers to every serving instance's fan-out manager.
//
// ============================================================================

use crate::config::Config;
use crate::error::AppResult;
use crate::model::{Transaction, WorkItem};
use redis::{cmd, AsyncCommands, Client};

pub struct WorkQueue {
    client: redis::aio::ConnectionManager,
    work_queue_key: String,
    events_channel: String,
}

impl WorkQueue {
    pub async fn new(config: &Config) -> AppResult<Self> {
        tracing::debug!("Opening Redis client...");
        let client = Client::open(config.redis_url.clone())?;

        tracing::debug!("Getting Redis connection manager...");
        let conn = client.get_connection_manager().await?;

        Ok(Self {
            client: conn,
            work_queue_key: config.work_queue_key.clone(),
            events_channel: config.events_channel.clone(),
        })
    }

    /// Pushes a work item onto the durable queue.
    pub async fn enqueue_work(&mut self, item: &WorkItem) -> AppResult<()> {
        let payload = serde_json::to_string(item)?;
        let _: () = self.client.lpush(&self.work_queue_key, payload).await?;
        tracing::info!(
            task_id = %item.task_id,
            transaction_id = item.transaction_id,
            "Enqueued work item"
        );
        Ok(())
    }

    /// Blocking pop with a timeout; `None` when the queue stayed empty.
    ///
    /// An unparseable payload is dropped with an error log rather than
    /// wedging the queue on a poison item.
    pub async fn pop_work(&mut self, timeout_secs: f64) -> AppResult<Option<WorkItem>> {
        let popped: Option<(String, String)> = self
            .client
            .brpop(&self.work_queue_key, timeout_secs)
            .await?;

        match popped {
            Some((_key, payload)) => match serde_json::from_str::<WorkItem>(&payload) {
                Ok(item) => Ok(Some(item)),
                Err(e) => {
                    tracing::error!(error = %e, payload = %payload, "Dropping unparseable work item");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Publishes a transaction snapshot on the events channel.
    ///
    /// Fan-out subscribers on every serving instance pick this up; zero
    /// subscribers is not an error.
    pub async fn publish_event(&mut self, snapshot: &Transaction) -> AppResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        let receivers: i64 = self.client.publish(&self.events_channel, payload).await?;
        tracing::debug!(
            transaction_id = snapshot.id,
            status = %snapshot.status,
            receivers,
            "Published transaction event"
        );
        Ok(())
    }

    pub async fn ping(&mut self) -> AppResult<()> {
        let _: () = cmd("PING").query_async(&mut self.client).await?;
        Ok(())
    }
}
