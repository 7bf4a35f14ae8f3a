use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::bridge;
use crate::context::AppContext;
use crate::model::Transaction;

/// POST /internal/notify-transaction
///
/// Trusted hand-off surface for workers running callback-style. The delivery
/// attempts are scheduled, not awaited: this returns as soon as they are
/// queued and never reports delivery failures to the caller.
pub async fn notify_transaction(
    State(ctx): State<Arc<AppContext>>,
    Json(snapshot): Json<Transaction>,
) -> impl IntoResponse {
    tracing::debug!(
        transaction_id = snapshot.id,
        status = %snapshot.status,
        "Received bridge notification"
    );
    bridge::schedule_notification(ctx.fanout.clone(), snapshot);
    Json(json!({ "status": "notified" }))
}
