use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Stock item. Items are global: every user's transactions move the same
/// `current_stock`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,

    /// Item name (unique)
    pub name: String,

    /// Opening stock quantity
    #[serde(rename = "stokAwal")]
    pub initial_stock: Decimal,

    /// Current stock quantity; never negative
    #[serde(rename = "stokSaatIni")]
    pub current_stock: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    #[serde(rename = "stokAwal", default)]
    pub initial_stock: Decimal,
}

/// Item update request. Changing `stokAwal` shifts the current stock by the
/// same difference.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateItem {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub name: Option<String>,
    #[serde(rename = "stokAwal")]
    pub initial_stock: Option<Decimal>,
}

/// Manual stock correction request
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStock {
    /// Signed quantity added to the current stock
    pub adjustment: Decimal,
    pub reason: Option<String>,
}

/// One row of the stock summary report
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "stokAwal")]
    pub initial_stock: Decimal,
    pub total_purchased: Decimal,
    pub total_sold: Decimal,
    #[serde(rename = "stokSaatIni")]
    pub current_stock: Decimal,
}
