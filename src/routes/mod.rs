// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: main router assembly and middleware
// - transactions.rs: admission, dispatch, listing, stats
// - stream.rs: WebSocket observer stream
// - internal.rs: trusted notification bridge endpoint
// - health.rs: health check and metrics endpoints
//
// ============================================================================

mod health;
mod internal;
mod stream;
mod transactions;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Transaction lifecycle
        .route("/transactions/create", post(transactions::create_transaction))
        .route(
            "/transactions/async-process",
            post(transactions::async_process),
        )
        .route("/transactions/list", get(transactions::list_transactions))
        .route("/transactions/stats", get(transactions::transaction_stats))
        .route("/transactions/stream", get(stream::transaction_stream))
        .route("/transactions/:id", get(transactions::get_transaction))
        // Trusted internal surface, not for public exposure
        .route(
            "/internal/notify-transaction",
            post(internal::notify_transaction),
        )
        .layer(TraceLayer::new_for_http())
        // The browser frontend is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(app_context)
}
