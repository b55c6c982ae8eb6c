use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::models::amount;

/// Transaction type. SALE takes stock out, PURCHASE brings it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum TransactionKind {
    #[serde(rename = "SALE")]
    #[sqlx(rename = "SALE")]
    Sale,

    #[serde(rename = "PURCHASE")]
    #[sqlx(rename = "PURCHASE")]
    Purchase,
}

impl TransactionKind {
    /// Signed effect of `quantity` on an item's stock.
    pub fn stock_delta(self, quantity: Decimal) -> Decimal {
        match self {
            TransactionKind::Sale => -quantity,
            TransactionKind::Purchase => quantity,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Sale => write!(f, "SALE"),
            TransactionKind::Purchase => write!(f, "PURCHASE"),
        }
    }
}

/// Sale or purchase of an item, owned by a user.
///
/// Maps to the `transactions` table. `item_name` is a snapshot taken when
/// the transaction was written; `total` is always `quantity * price`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionKind,

    /// Customer for a SALE, supplier for a PURCHASE
    pub customer: String,

    pub shipment_note_number: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_order_number: Option<String>,
    pub secondary_shipment_note_number: Option<String>,

    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update request body; updates replace every field.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub customer: String,
    #[validate(length(max = 100))]
    pub shipment_note_number: Option<String>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
    #[validate(length(max = 100))]
    pub purchase_order_number: Option<String>,
    #[validate(length(max = 100))]
    pub secondary_shipment_note_number: Option<String>,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl TransactionInput {
    /// Checks the numeric fields `validator` cannot express for `Decimal`.
    pub fn check_amounts(&self) -> Result<(), String> {
        if self.quantity <= Decimal::ZERO {
            return Err("quantity must be greater than 0".to_string());
        }
        if self.price < Decimal::ZERO {
            return Err("price must not be negative".to_string());
        }
        amount::check_quantity("quantity", self.quantity)?;
        amount::check_money("price", self.price, amount::PRICE_DIGITS)?;
        Ok(())
    }

    /// Line total as stored, rounded to cents.
    pub fn total(&self) -> Result<Decimal, String> {
        amount::line_total(self.quantity, self.price)
    }
}

/// Query parameters shared by transaction listings and reports
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub customer: Option<String>,
    pub item_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stock_delta_sign() {
        let qty = Decimal::from(50);
        assert_eq!(TransactionKind::Purchase.stock_delta(qty), Decimal::from(50));
        assert_eq!(TransactionKind::Sale.stock_delta(qty), Decimal::from(-50));
    }

    #[test]
    fn test_kind_wire_names() {
        let kind: TransactionKind = serde_json::from_str("\"PURCHASE\"").unwrap();
        assert_eq!(kind, TransactionKind::Purchase);
        assert_eq!(serde_json::to_string(&TransactionKind::Sale).unwrap(), "\"SALE\"");
    }

    #[test]
    fn test_input_total_and_amount_checks() {
        let input: TransactionInput = serde_json::from_value(serde_json::json!({
            "date": "2024-03-01",
            "type": "SALE",
            "customer": "Toko A",
            "itemId": Uuid::new_v4(),
            "quantity": 12.5,
            "price": 4000
        }))
        .unwrap();
        assert_eq!(input.total().unwrap(), Decimal::from(50000));
        assert!(input.check_amounts().is_ok());

        let zero = TransactionInput {
            quantity: Decimal::ZERO,
            ..input
        };
        assert!(zero.check_amounts().is_err());
    }

    fn sale(quantity: &str, price: &str) -> TransactionInput {
        TransactionInput {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            kind: TransactionKind::Sale,
            customer: "Toko A".to_string(),
            shipment_note_number: None,
            invoice_number: None,
            purchase_order_number: None,
            secondary_shipment_note_number: None,
            item_id: Uuid::new_v4(),
            quantity: Decimal::from_str(quantity).unwrap(),
            price: Decimal::from_str(price).unwrap(),
        }
    }

    #[test]
    fn test_quantity_finer_than_stock_column_rejected() {
        // would be stored as 1.001 while the stock moved by 1.0005
        assert!(sale("1.0005", "1000").check_amounts().is_err());
        assert!(sale("1.005", "1000").check_amounts().is_ok());
        assert!(sale("1", "0.001").check_amounts().is_err());
    }

    #[test]
    fn test_oversized_amounts_rejected_without_panic() {
        let huge = sale("100000000000000000000", "100000000000000000000");
        assert!(huge.check_amounts().is_err());
        assert!(huge.total().is_err());
    }
}
