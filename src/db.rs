use crate::config::Config;
use crate::model::{Transaction, TransactionKind, TransactionStatus};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

const TRANSACTION_COLUMNS: &str =
    "id, subject_id, amount, kind, status, idempotency_key, created_at, updated_at";

/// Raw row as stored; `kind` and `status` are TEXT columns and get parsed
/// into the domain enums on the way out.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    subject_id: String,
    amount: f64,
    kind: String,
    status: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = sqlx::Error;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            subject_id: row.subject_id,
            amount: row.amount,
            kind: row.kind.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            status: row
                .status
                .parse()
                .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn create_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(Duration::from_secs(config.db.acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Inserts a pending transaction under the resolved idempotency key.
///
/// Returns `None` when a concurrent insert under the same key won the race:
/// `ON CONFLICT DO NOTHING` turns the uniqueness violation into an empty
/// result instead of an error, and the caller re-fetches the winning row.
pub async fn insert_transaction(
    pool: &DbPool,
    subject_id: &str,
    amount: f64,
    kind: TransactionKind,
    idempotency_key: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transactions (subject_id, amount, kind, status, idempotency_key, created_at)
        VALUES ($1, $2, $3, 'pending', $4, NOW())
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING id, subject_id, amount, kind, status, idempotency_key, created_at, updated_at
        "#,
    )
    .bind(subject_id)
    .bind(amount)
    .bind(kind.as_str())
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await?;

    row.map(Transaction::try_from).transpose()
}

pub async fn find_by_idempotency_key(
    pool: &DbPool,
    idempotency_key: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {} FROM transactions WHERE idempotency_key = $1",
        TRANSACTION_COLUMNS
    ))
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await?;

    row.map(Transaction::try_from).transpose()
}

pub async fn get_transaction(
    pool: &DbPool,
    id: i64,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {} FROM transactions WHERE id = $1",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Transaction::try_from).transpose()
}

/// Moves a pending transaction to a terminal status.
///
/// The `status = 'pending'` guard makes the transition monotonic: a
/// redelivered work item whose transaction already reached a terminal state
/// matches no row and returns `None`, so it can never be double-processed.
pub async fn transition_status(
    pool: &DbPool,
    id: i64,
    to: TransactionStatus,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        UPDATE transactions
        SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING id, subject_id, amount, kind, status, idempotency_key, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(to.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(Transaction::try_from).transpose()
}

/// Returns a failed transaction to `pending` for an explicit re-submission.
///
/// Guarded the same way as `transition_status`: only a row currently in
/// `failed` matches, so a concurrent worker writing a terminal status and a
/// concurrent retry reset cannot step on each other. `None` means the row
/// was not in `failed` anymore.
pub async fn reset_for_retry(
    pool: &DbPool,
    id: i64,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        UPDATE transactions
        SET status = 'pending', updated_at = NOW()
        WHERE id = $1 AND status = 'failed'
        RETURNING id, subject_id, amount, kind, status, idempotency_key, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Transaction::try_from).transpose()
}

/// Listing filters; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub subject_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub skip: i64,
    pub limit: i64,
}

pub async fn list_transactions(
    pool: &DbPool,
    filter: &ListFilter,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE ($1::text IS NULL OR subject_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY id
        OFFSET $3 LIMIT $4
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(filter.subject_id.as_deref())
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.skip.max(0))
    .bind(filter.limit.clamp(1, 1000))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Transaction::try_from).collect()
}

/// Aggregated counts for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionStats {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_kind: HashMap<String, i64>,
}

pub async fn transaction_stats(pool: &DbPool) -> Result<TransactionStats, sqlx::Error> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?;

    let by_status: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM transactions GROUP BY status")
            .fetch_all(pool)
            .await?;

    let by_kind: Vec<(String, i64)> =
        sqlx::query_as("SELECT kind, COUNT(*) FROM transactions GROUP BY kind")
            .fetch_all(pool)
            .await?;

    Ok(TransactionStats {
        total: total.0,
        by_status: by_status.into_iter().collect(),
        by_kind: by_kind.into_iter().collect(),
    })
}

pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
