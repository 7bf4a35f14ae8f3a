//! Work dispatcher: hands a transaction id to the background queue.

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::model::{TransactionStatus, WorkItem};
use crate::queue::WorkQueue;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub message: String,
    pub transaction_id: i64,
    pub task_id: Uuid,
    pub status: &'static str,
}

/// Enqueues a transaction for asynchronous processing.
///
/// Re-enqueueing a terminal success is rejected. A `failed` transaction may
/// be re-submitted explicitly, which is the only retry path the lifecycle
/// defines: the dispatcher returns the row to `pending` first so the
/// worker's pending-only transition guard lets the retry through while
/// still stopping redelivered duplicates.
pub async fn dispatch(
    pool: &DbPool,
    queue: &Arc<Mutex<WorkQueue>>,
    transaction_id: i64,
) -> AppResult<DispatchResponse> {
    let transaction = db::get_transaction(pool, transaction_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("transaction {} does not exist", transaction_id))
        })?;

    if transaction.status == TransactionStatus::Processed {
        return Err(AppError::AlreadyProcessed(format!(
            "transaction {} was already processed",
            transaction_id
        )));
    }

    if transaction.status == TransactionStatus::Failed {
        match db::reset_for_retry(pool, transaction_id).await? {
            Some(_) => {
                tracing::info!(
                    transaction_id,
                    "Failed transaction returned to pending for retry"
                );
            }
            // A concurrent dispatch already reset it; the worker guard
            // handles whatever state the row is in by the time the item
            // is consumed.
            None => {
                tracing::debug!(transaction_id, "Retry reset lost a race, enqueueing anyway");
            }
        }
    }

    let item = WorkItem::new(transaction_id);
    queue.lock().await.enqueue_work(&item).await?;
    metrics::WORK_ITEMS_ENQUEUED_TOTAL.inc();

    Ok(DispatchResponse {
        message: "Transaction enqueued for processing".to_string(),
        transaction_id,
        task_id: item.task_id,
        status: "enqueued",
    })
}
