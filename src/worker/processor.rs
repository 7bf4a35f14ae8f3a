// ============================================================================
// Transaction Processor
// ============================================================================
//
// One queue consumption drives one transaction through its state machine:
//
//   pending -> emit "processing" -> simulated work -> failure draw
//           -> terminal status persisted -> terminal notification
//
// Each status write is flushed to the store before the corresponding event
// is published, so an observer never sees a notification for a state that is
// not yet durable. Event publishing failures are tolerated: they are logged
// and never roll the persisted state back.
//
// ============================================================================

use crate::db::{self, DbPool};
use crate::model::{Transaction, TransactionStatus, WorkItem};
use crate::queue::WorkQueue;
use crate::worker::simulation::ProcessingPolicy;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Result of one worker invocation.
///
/// Infrastructure errors before the transaction is loaded surface as `Err`
/// from `process_work_item` instead; they leave no state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Terminal success persisted and announced.
    Completed,
    /// The modeled business failure: persisted as the `failed` status, not
    /// an error.
    Failed,
    /// The referenced transaction does not exist.
    NotFound,
    /// The transaction had already left `pending` (queue redelivery or an
    /// explicit re-submission that lost the race); nothing was mutated.
    Skipped,
}

/// Shared state for a worker process.
pub struct WorkerState {
    pub pool: DbPool,
    pub queue: Arc<Mutex<WorkQueue>>,
    pub policy: Arc<dyn ProcessingPolicy>,
}

pub async fn process_work_item(state: &WorkerState, item: &WorkItem) -> Result<ProcessOutcome> {
    let transaction = db::get_transaction(&state.pool, item.transaction_id)
        .await
        .context("Failed to load transaction from store")?;

    let Some(transaction) = transaction else {
        warn!(
            task_id = %item.task_id,
            transaction_id = item.transaction_id,
            "Work item references a missing transaction"
        );
        return Ok(ProcessOutcome::NotFound);
    };

    if transaction.status != TransactionStatus::Pending {
        info!(
            task_id = %item.task_id,
            transaction_id = transaction.id,
            status = %transaction.status,
            "Transaction already terminal, skipping redelivered work item"
        );
        return Ok(ProcessOutcome::Skipped);
    }

    // Processing has started; the status is unchanged but observers get the
    // signal before the simulated work begins.
    emit_event(state, &transaction).await;

    let delay = state.policy.work_delay();
    info!(
        task_id = %item.task_id,
        transaction_id = transaction.id,
        delay_ms = delay.as_millis() as u64,
        "Processing transaction"
    );
    tokio::time::sleep(delay).await;

    let target = if state.policy.should_fail() {
        TransactionStatus::Failed
    } else {
        TransactionStatus::Processed
    };

    match db::transition_status(&state.pool, transaction.id, target).await {
        Ok(Some(updated)) => {
            emit_event(state, &updated).await;
            let outcome = match target {
                TransactionStatus::Failed => ProcessOutcome::Failed,
                _ => ProcessOutcome::Completed,
            };
            info!(
                task_id = %item.task_id,
                transaction_id = updated.id,
                status = %updated.status,
                "Transaction reached terminal state"
            );
            Ok(outcome)
        }
        Ok(None) => {
            // Another in-flight invocation won the terminal write.
            info!(
                task_id = %item.task_id,
                transaction_id = transaction.id,
                "Terminal transition lost the race, skipping"
            );
            Ok(ProcessOutcome::Skipped)
        }
        Err(e) => {
            // The record was loaded, so the lifecycle contract is to land it
            // in `failed` rather than leave it pending forever.
            error!(
                task_id = %item.task_id,
                transaction_id = transaction.id,
                error = %e,
                "Terminal status write failed, attempting failed-state fallback"
            );
            match db::transition_status(&state.pool, transaction.id, TransactionStatus::Failed)
                .await
            {
                Ok(Some(failed_tx)) => {
                    emit_event(state, &failed_tx).await;
                    Ok(ProcessOutcome::Failed)
                }
                _ => Err(e).context("Failed to persist terminal transaction status"),
            }
        }
    }
}

/// Publishes a snapshot on the notification channel.
///
/// Delivery is independent of the transaction lifecycle: a publish failure
/// is an infrastructure problem on the observer path, never a reason to
/// touch the persisted state.
async fn emit_event(state: &WorkerState, snapshot: &Transaction) {
    if let Err(e) = state.queue.lock().await.publish_event(snapshot).await {
        warn!(
            transaction_id = snapshot.id,
            status = %snapshot.status,
            error = %e,
            "Failed to publish transaction event, persisted state is unaffected"
        );
    }
}
