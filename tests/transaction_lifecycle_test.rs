//! Transaction lifecycle against live Postgres and Redis.
//!
//! Ignored by default; run with `cargo test -- --ignored` with DATABASE_URL
//! pointing at a disposable database and a local Redis available (REDIS_URL
//! overrides the default 127.0.0.1:6379).

use ledgerstream::admission::{self, CreateTransaction};
use ledgerstream::config::{Config, DbConfig, WorkerConfig};
use ledgerstream::db::{self, DbPool};
use ledgerstream::dispatch;
use ledgerstream::error::AppError;
use ledgerstream::model::{TransactionKind, TransactionStatus};
use ledgerstream::queue::WorkQueue;
use ledgerstream::worker::{process_work_item, FixedPolicy, ProcessOutcome, WorkerState};
use serial_test::serial;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

fn test_config() -> Config {
    let suffix = Uuid::new_v4();
    Config {
        database_url: env::var("DATABASE_URL")
            .expect("DATABASE_URL must point at a test database"),
        redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        port: 8000,
        work_queue_key: format!("test_work_queue:{}", suffix),
        events_channel: format!("test_events:{}", suffix),
        rust_log: "info".to_string(),
        db: DbConfig {
            max_connections: 2,
            acquire_timeout_secs: 5,
        },
        worker: WorkerConfig {
            processing_delay_min_ms: 0,
            processing_delay_max_ms: 0,
            failure_probability: 0.0,
            poll_timeout_secs: 1.0,
        },
    }
}

async fn setup() -> (DbPool, Arc<Mutex<WorkQueue>>) {
    let config = test_config();
    let pool = db::create_pool(&config).await.expect("postgres connection");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    let queue = Arc::new(Mutex::new(
        WorkQueue::new(&config).await.expect("redis connection"),
    ));
    (pool, queue)
}

/// Fresh idempotency key per call so runs never collide with leftover rows.
fn create_request(subject_id: &str) -> CreateTransaction {
    CreateTransaction {
        subject_id: subject_id.to_string(),
        amount: 42.5,
        kind: TransactionKind::Deposit,
        idempotency_key: Some(Uuid::new_v4().to_string()),
    }
}

fn worker_state(pool: &DbPool, queue: &Arc<Mutex<WorkQueue>>, fail: bool) -> WorkerState {
    WorkerState {
        pool: pool.clone(),
        queue: queue.clone(),
        policy: Arc::new(FixedPolicy {
            delay: Duration::from_millis(10),
            fail,
        }),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres and Redis"]
async fn repeated_admission_returns_the_same_row() {
    let (pool, _queue) = setup().await;
    let request = create_request("it-subject");

    let first = admission::admit(&pool, None, &request)
        .await
        .expect("first admission");
    let second = admission::admit(&pool, None, &request)
        .await
        .expect("second admission");

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, TransactionStatus::Pending);

    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE idempotency_key = $1")
            .bind(request.idempotency_key.as_deref().unwrap())
            .fetch_one(&pool)
            .await
            .expect("count query");
    assert_eq!(count.0, 1, "admission must create exactly one row");
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres and Redis"]
async fn processed_transaction_carries_a_later_update_timestamp() {
    let (pool, queue) = setup().await;
    let admitted = admission::admit(&pool, None, &create_request("it-subject"))
        .await
        .expect("admission");
    assert!(admitted.updated_at.is_none());

    let response = dispatch::dispatch(&pool, &queue, admitted.id)
        .await
        .expect("dispatch");
    let item = queue
        .lock()
        .await
        .pop_work(1.0)
        .await
        .expect("pop")
        .expect("work item");
    assert_eq!(item.task_id, response.task_id);

    let state = worker_state(&pool, &queue, false);
    let outcome = process_work_item(&state, &item).await.expect("processing");
    assert_eq!(outcome, ProcessOutcome::Completed);

    let stored = db::get_transaction(&pool, admitted.id)
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.status, TransactionStatus::Processed);
    let updated_at = stored.updated_at.expect("terminal rows carry updated_at");
    assert!(updated_at > stored.created_at);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres and Redis"]
async fn failed_transaction_can_be_resubmitted_and_reprocessed() {
    let (pool, queue) = setup().await;
    let admitted = admission::admit(&pool, None, &create_request("it-subject"))
        .await
        .expect("admission");

    dispatch::dispatch(&pool, &queue, admitted.id)
        .await
        .expect("first dispatch");
    let item = queue
        .lock()
        .await
        .pop_work(1.0)
        .await
        .expect("pop")
        .expect("work item");

    let failing = worker_state(&pool, &queue, true);
    let outcome = process_work_item(&failing, &item).await.expect("processing");
    assert_eq!(outcome, ProcessOutcome::Failed);
    let stored = db::get_transaction(&pool, admitted.id)
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.status, TransactionStatus::Failed);

    // Explicit re-submission: the row goes back to pending and the retry is
    // genuinely processed, not skipped by the redelivery guard.
    let retry = dispatch::dispatch(&pool, &queue, admitted.id)
        .await
        .expect("re-dispatch of failed transaction");
    assert_eq!(retry.status, "enqueued");
    let stored = db::get_transaction(&pool, admitted.id)
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.status, TransactionStatus::Pending);

    let item = queue
        .lock()
        .await
        .pop_work(1.0)
        .await
        .expect("pop")
        .expect("retry work item");
    let succeeding = worker_state(&pool, &queue, false);
    let outcome = process_work_item(&succeeding, &item)
        .await
        .expect("retry processing");
    assert_eq!(outcome, ProcessOutcome::Completed);
    let stored = db::get_transaction(&pool, admitted.id)
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.status, TransactionStatus::Processed);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres and Redis"]
async fn processed_transaction_cannot_be_redispatched() {
    let (pool, queue) = setup().await;
    let admitted = admission::admit(&pool, None, &create_request("it-subject"))
        .await
        .expect("admission");

    dispatch::dispatch(&pool, &queue, admitted.id)
        .await
        .expect("dispatch");
    let item = queue
        .lock()
        .await
        .pop_work(1.0)
        .await
        .expect("pop")
        .expect("work item");
    let state = worker_state(&pool, &queue, false);
    process_work_item(&state, &item).await.expect("processing");

    let err = dispatch::dispatch(&pool, &queue, admitted.id)
        .await
        .expect_err("terminal success must reject re-dispatch");
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
}
