// ============================================================================
// Notification Bridge
// ============================================================================
//
// Carries worker-produced transaction events into the serving context's
// fan-out path. The worker may run in a different process or on a different
// host, so the hand-off goes through a Redis pub/sub channel: the worker
// publishes a snapshot, and every serving instance runs the subscriber below
// feeding its own local registry. A trusted internal HTTP endpoint
// (`POST /internal/notify-transaction`) offers the same hand-off for
// single-instance callback-style deployments.
//
// ============================================================================

use crate::fanout::FanoutManager;
use crate::model::Transaction;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Subscribes to the transaction events channel and feeds the local fan-out
/// manager, resubscribing whenever the connection drops.
///
/// Events are delivered inline, one at a time, so the per-transaction order
/// the worker produced (processing, then terminal) reaches each observer
/// intact.
pub async fn run_event_subscriber(
    redis_url: String,
    channel: String,
    fanout: Arc<FanoutManager>,
) -> Result<()> {
    let client =
        redis::Client::open(redis_url.as_str()).context("Failed to create Redis client")?;

    loop {
        let mut pubsub = match client.get_async_pubsub().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Failed to open Pub/Sub connection, retrying");
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                continue;
            }
        };

        if let Err(e) = pubsub.subscribe(channel.as_str()).await {
            error!(error = %e, channel = %channel, "Failed to subscribe, retrying");
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            continue;
        }

        info!(channel = %channel, "Subscribed to transaction events");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "Failed to read event payload");
                    continue;
                }
            };

            let snapshot: Transaction = match serde_json::from_str(&payload) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, payload = %payload, "Failed to parse transaction event");
                    continue;
                }
            };

            fanout.notify_transaction_change(&snapshot).await;
        }

        warn!(channel = %channel, "Event subscription closed, resubscribing");
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Schedules the broadcast and subject-scoped deliveries for one event
/// without waiting for them, decoupling the caller from observer liveness.
/// Delivery errors stay inside the fan-out manager and never reach here.
pub fn schedule_notification(fanout: Arc<FanoutManager>, snapshot: Transaction) {
    tokio::spawn(async move {
        fanout.notify_transaction_change(&snapshot).await;
    });
}
