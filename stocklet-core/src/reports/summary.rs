use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::inventory::transactions::list_transactions;
use crate::models::transaction::{Transaction, TransactionFilter, TransactionKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTotals {
    pub count: usize,
    pub total_quantity: Decimal,
    pub total_amount: Decimal,
}

impl TransactionTotals {
    pub fn of(transactions: &[Transaction]) -> Self {
        transactions.iter().fold(Self::default(), |mut acc, tx| {
            acc.count += 1;
            acc.total_quantity += tx.quantity;
            acc.total_amount += tx.total;
            acc
        })
    }
}

/// Sales or purchases listing with its column totals.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub transactions: Vec<Transaction>,
    pub summary: TransactionTotals,
}

/// Runs a report over the user's transactions of `kind`. Any `type` in the
/// filter is overridden by `kind`.
pub async fn transaction_report(
    pool: &PgPool,
    user_id: Uuid,
    kind: TransactionKind,
    filter: TransactionFilter,
) -> Result<TransactionReport, AppError> {
    let filter = TransactionFilter {
        kind: Some(kind),
        ..filter
    };
    let transactions = list_transactions(pool, user_id, &filter).await?;
    let summary = TransactionTotals::of(&transactions);
    Ok(TransactionReport { transactions, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn sale(quantity: i64, price: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            kind: TransactionKind::Sale,
            customer: "Toko A".to_string(),
            shipment_note_number: None,
            invoice_number: None,
            purchase_order_number: None,
            secondary_shipment_note_number: None,
            item_id: Uuid::new_v4(),
            item_name: "Besi Beton".to_string(),
            quantity: Decimal::from(quantity),
            price: Decimal::from(price),
            total: Decimal::from(quantity * price),
            user_id: Uuid::nil(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_of_empty_listing() {
        assert_eq!(TransactionTotals::of(&[]), TransactionTotals::default());
    }

    #[test]
    fn test_totals_sum_quantity_and_amount() {
        let totals = TransactionTotals::of(&[sale(150, 1000), sale(3, 2500)]);
        assert_eq!(totals.count, 2);
        assert_eq!(totals.total_quantity, Decimal::from(153));
        assert_eq!(totals.total_amount, Decimal::from(157_500));
    }

    #[test]
    fn test_totals_serialize_camel_case() {
        let json = serde_json::to_value(TransactionTotals::of(&[sale(2, 10)])).unwrap();
        assert_eq!(json["count"], 1);
        assert!(json.get("totalQuantity").is_some());
        assert!(json.get("totalAmount").is_some());
    }
}
