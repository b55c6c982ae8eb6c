use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum PaymentType {
    /// Money received from a customer
    #[serde(rename = "receivable_payment")]
    #[sqlx(rename = "receivable_payment")]
    Receivable,

    /// Money paid to a supplier
    #[serde(rename = "payable_payment")]
    #[sqlx(rename = "payable_payment")]
    Payable,
}

/// Payment recorded against a receivable or payable. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayment {
    pub id: Uuid,
    pub customer: String,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub customer: String,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub customer: Option<String>,
    pub payment_type: Option<PaymentType>,
}
