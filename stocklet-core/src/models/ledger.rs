use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Opening receivable/payable balances for one counterparty of one user.
///
/// Unique on `(customer, user_id)`; written only by upsert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerLedger {
    pub id: Uuid,
    pub customer: String,
    pub user_id: Uuid,
    pub initial_receivable: Decimal,
    pub initial_payable: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert request; omitted balances keep their stored value.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLedger {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub customer: String,
    pub initial_receivable: Option<Decimal>,
    pub initial_payable: Option<Decimal>,
}
