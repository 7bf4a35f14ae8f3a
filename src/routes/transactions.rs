use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::admission::{self, CreateTransaction};
use crate::context::AppContext;
use crate::db::{self, ListFilter};
use crate::dispatch;
use crate::error::{AppError, AppResult};
use crate::model::TransactionStatus;

const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// POST /transactions/create
///
/// Returns 201 both on first creation and on idempotent replay; the two are
/// indistinguishable in the response.
pub async fn create_transaction(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(request): Json<CreateTransaction>,
) -> AppResult<impl IntoResponse> {
    let header_token = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok());

    let transaction = admission::admit(&ctx.db_pool, header_token, &request).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[derive(Debug, Deserialize)]
pub struct AsyncProcessRequest {
    pub transaction_id: i64,
}

/// POST /transactions/async-process
pub async fn async_process(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<AsyncProcessRequest>,
) -> AppResult<impl IntoResponse> {
    let response = dispatch::dispatch(&ctx.db_pool, &ctx.queue, request.transaction_id).await?;
    Ok(Json(response))
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub subject_id: Option<String>,
    pub status: Option<TransactionStatus>,
}

/// GET /transactions/list
pub async fn list_transactions(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = ListFilter {
        subject_id: params.subject_id,
        status: params.status,
        skip: params.skip,
        limit: params.limit,
    };
    let transactions = db::list_transactions(&ctx.db_pool, &filter).await?;
    Ok(Json(transactions))
}

/// GET /transactions/stats
pub async fn transaction_stats(
    State(ctx): State<Arc<AppContext>>,
) -> AppResult<impl IntoResponse> {
    let stats = db::transaction_stats(&ctx.db_pool).await?;
    let active_connections = ctx.fanout.connection_count().await;

    Ok(Json(json!({
        "total": stats.total,
        "by_status": stats.by_status,
        "by_kind": stats.by_kind,
        "active_websocket_connections": active_connections,
    })))
}

/// GET /transactions/:id
pub async fn get_transaction(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let transaction = db::get_transaction(&ctx.db_pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("transaction {} does not exist", id)))?;
    Ok(Json(transaction))
}
