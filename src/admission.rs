//! Idempotent transaction admission.
//!
//! Every admission call resolves exactly one idempotency token and performs a
//! find-or-create against the store under it. Repeated calls with the same
//! effective token always return the same row and never mutate it.

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::model::{Transaction, TransactionKind};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Admission request payload. Unknown `kind` values are rejected during
/// deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub subject_id: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub idempotency_key: Option<String>,
}

/// Validates an admission request before it touches the store.
///
/// The amount must be strictly positive; everything else is enforced by
/// deserialization and the schema.
pub fn validate(request: &CreateTransaction) -> AppResult<()> {
    if request.amount <= 0.0 {
        return Err(AppError::validation("amount must be positive"));
    }
    Ok(())
}

/// Resolves the effective idempotency token.
///
/// Precedence: explicit side-channel token (the `X-Idempotency-Key` header),
/// then the payload field, then a token derived from the request content.
pub fn resolve_idempotency_key(
    header_token: Option<&str>,
    request: &CreateTransaction,
) -> String {
    header_token
        .map(str::to_string)
        .or_else(|| request.idempotency_key.clone())
        .unwrap_or_else(|| derive_idempotency_key(request))
}

/// Content-derived token: SHA-256 over the canonical JSON serialization of
/// the identifying fields. `serde_json::Map` keeps keys sorted, so equal
/// requests always hash equally regardless of field order on the wire.
pub fn derive_idempotency_key(request: &CreateTransaction) -> String {
    let canonical = serde_json::json!({
        "amount": request.amount,
        "kind": request.kind,
        "subject_id": request.subject_id,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Admits a transaction: validates, resolves the token and find-or-creates.
///
/// The naive check-then-insert is racy, so the insert itself is the
/// arbiter: `ON CONFLICT DO NOTHING` followed by a re-fetch turns a lost
/// race into "found existing" instead of a server error.
pub async fn admit(
    pool: &DbPool,
    header_token: Option<&str>,
    request: &CreateTransaction,
) -> AppResult<Transaction> {
    validate(request)?;

    let idempotency_key = resolve_idempotency_key(header_token, request);

    if let Some(existing) = db::find_by_idempotency_key(pool, &idempotency_key).await? {
        tracing::debug!(
            transaction_id = existing.id,
            "Idempotent replay, returning existing transaction"
        );
        return Ok(existing);
    }

    if let Some(created) = db::insert_transaction(
        pool,
        &request.subject_id,
        request.amount,
        request.kind,
        &idempotency_key,
    )
    .await?
    {
        metrics::TRANSACTIONS_ADMITTED_TOTAL.inc();
        tracing::info!(
            transaction_id = created.id,
            subject_id = %created.subject_id,
            kind = %created.kind,
            "Transaction admitted"
        );
        return Ok(created);
    }

    // A concurrent insert won the race between lookup and insert; the
    // winning row is the idempotent result.
    match db::find_by_idempotency_key(pool, &idempotency_key).await? {
        Some(existing) => {
            tracing::debug!(
                transaction_id = existing.id,
                "Insert race resolved by re-fetch"
            );
            Ok(existing)
        }
        None => Err(AppError::Conflict(
            "idempotency key conflict could not be resolved".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(token: Option<&str>) -> CreateTransaction {
        CreateTransaction {
            subject_id: "u1".to_string(),
            amount: 100.0,
            kind: TransactionKind::Deposit,
            idempotency_key: token.map(str::to_string),
        }
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut req = request(None);
        req.amount = 0.0;
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut req = request(None);
        req.amount = -25.0;
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn smallest_positive_amount_is_accepted() {
        let mut req = request(None);
        req.amount = 0.01;
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn header_token_takes_precedence_over_payload() {
        let key = resolve_idempotency_key(Some("T1"), &request(Some("T2")));
        assert_eq!(key, "T1");
    }

    #[test]
    fn payload_token_beats_derivation() {
        let key = resolve_idempotency_key(None, &request(Some("T2")));
        assert_eq!(key, "T2");
    }

    #[test]
    fn derived_token_is_deterministic() {
        let a = resolve_idempotency_key(None, &request(None));
        let b = resolve_idempotency_key(None, &request(None));
        assert_eq!(a, b);
        // sha256 hex
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn derived_token_depends_on_content() {
        let base = derive_idempotency_key(&request(None));

        let mut other_amount = request(None);
        other_amount.amount = 100.01;
        assert_ne!(base, derive_idempotency_key(&other_amount));

        let mut other_kind = request(None);
        other_kind.kind = TransactionKind::Withdrawal;
        assert_ne!(base, derive_idempotency_key(&other_kind));

        let mut other_subject = request(None);
        other_subject.subject_id = "u2".to_string();
        assert_ne!(base, derive_idempotency_key(&other_subject));
    }

    #[test]
    fn unknown_kind_is_rejected_at_deserialization() {
        let result = serde_json::from_str::<CreateTransaction>(
            r#"{"subject_id": "u1", "amount": 10, "kind": "loan"}"#,
        );
        assert!(result.is_err());
    }
}
