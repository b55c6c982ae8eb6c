use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::ledger::CustomerLedger;
use crate::models::payment::{AccountPayment, PaymentType};
use crate::models::transaction::{Transaction, TransactionKind};

/// Which side of the books a balance report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    /// Owed to the business by customers (sales)
    Receivable,
    /// Owed by the business to suppliers (purchases)
    Payable,
}

impl BalanceKind {
    pub fn transaction_kind(self) -> TransactionKind {
        match self {
            BalanceKind::Receivable => TransactionKind::Sale,
            BalanceKind::Payable => TransactionKind::Purchase,
        }
    }

    pub fn payment_type(self) -> PaymentType {
        match self {
            BalanceKind::Receivable => PaymentType::Receivable,
            BalanceKind::Payable => PaymentType::Payable,
        }
    }

    pub fn initial_balance(self, ledger: &CustomerLedger) -> Decimal {
        match self {
            BalanceKind::Receivable => ledger.initial_receivable,
            BalanceKind::Payable => ledger.initial_payable,
        }
    }
}

/// Balance of one counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    pub customer: String,
    pub initial_balance: Decimal,
    /// Total of sales (receivable) or purchases (payable)
    pub gross: Decimal,
    pub total_payments: Decimal,
    pub final_balance: Decimal,
}

impl BalanceRow {
    fn new(customer: String, initial_balance: Decimal, gross: Decimal, total_payments: Decimal) -> Self {
        Self {
            customer,
            initial_balance,
            gross,
            total_payments,
            final_balance: gross + initial_balance - total_payments,
        }
    }
}

/// Computes one balance row per counterparty.
///
/// Counterparties with matching transactions always get a row. Counterparties
/// known only from a ledger row get one when their opening balance or
/// payments are non-zero. Rows are sorted by name, byte-wise.
///
/// Inputs are expected to belong to a single user; transactions and payments
/// of the other kind are ignored.
pub fn compute_balances(
    transactions: &[Transaction],
    ledgers: &[CustomerLedger],
    payments: &[AccountPayment],
    kind: BalanceKind,
) -> Vec<BalanceRow> {
    let mut gross: BTreeMap<&str, Decimal> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.kind == kind.transaction_kind()) {
        *gross.entry(tx.customer.as_str()).or_insert(Decimal::ZERO) += tx.total;
    }

    let mut paid: HashMap<&str, Decimal> = HashMap::new();
    for payment in payments.iter().filter(|p| p.payment_type == kind.payment_type()) {
        *paid.entry(payment.customer.as_str()).or_insert(Decimal::ZERO) += payment.amount;
    }

    let initial: HashMap<&str, Decimal> = ledgers
        .iter()
        .map(|l| (l.customer.as_str(), kind.initial_balance(l)))
        .collect();

    let paid_by = |customer: &str| paid.get(customer).copied().unwrap_or(Decimal::ZERO);

    let mut rows: Vec<BalanceRow> = gross
        .iter()
        .map(|(customer, total)| {
            BalanceRow::new(
                customer.to_string(),
                initial.get(customer).copied().unwrap_or(Decimal::ZERO),
                *total,
                paid_by(customer),
            )
        })
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    for ledger in ledgers {
        let customer = ledger.customer.as_str();
        if gross.contains_key(customer) || !seen.insert(customer) {
            continue;
        }
        let opening = kind.initial_balance(ledger);
        let payments_total = paid_by(customer);
        if opening.is_zero() && payments_total.is_zero() {
            continue;
        }
        rows.push(BalanceRow::new(customer.to_string(), opening, Decimal::ZERO, payments_total));
    }

    rows.sort_by(|a, b| a.customer.cmp(&b.customer));
    rows
}

/// Column sums over a set of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTotals {
    pub initial_balance: Decimal,
    pub gross: Decimal,
    pub total_payments: Decimal,
    pub final_balance: Decimal,
}

pub fn totals(rows: &[BalanceRow]) -> BalanceTotals {
    rows.iter().fold(BalanceTotals::default(), |mut acc, row| {
        acc.initial_balance += row.initial_balance;
        acc.gross += row.gross;
        acc.total_payments += row.total_payments;
        acc.final_balance += row.final_balance;
        acc
    })
}

/// JSON view of a receivable row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableRow {
    pub customer: String,
    pub initial_receivable: Decimal,
    pub total_sales: Decimal,
    pub total_payments_received: Decimal,
    pub final_receivable_balance: Decimal,
}

/// JSON view of a payable row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableRow {
    pub customer: String,
    pub initial_payable: Decimal,
    pub total_purchases: Decimal,
    pub total_payments_made: Decimal,
    pub final_payable_balance: Decimal,
}

impl From<BalanceRow> for ReceivableRow {
    fn from(row: BalanceRow) -> Self {
        Self {
            customer: row.customer,
            initial_receivable: row.initial_balance,
            total_sales: row.gross,
            total_payments_received: row.total_payments,
            final_receivable_balance: row.final_balance,
        }
    }
}

impl From<BalanceRow> for PayableRow {
    fn from(row: BalanceRow) -> Self {
        Self {
            customer: row.customer,
            initial_payable: row.initial_balance,
            total_purchases: row.gross,
            total_payments_made: row.total_payments,
            final_payable_balance: row.final_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn tx(customer: &str, kind: TransactionKind, total: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            kind,
            customer: customer.to_string(),
            shipment_note_number: None,
            invoice_number: None,
            purchase_order_number: None,
            secondary_shipment_note_number: None,
            item_id: Uuid::new_v4(),
            item_name: "Besi Beton".to_string(),
            quantity: Decimal::ONE,
            price: Decimal::from(total),
            total: Decimal::from(total),
            user_id: Uuid::nil(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ledger(customer: &str, receivable: i64, payable: i64) -> CustomerLedger {
        let now = Utc::now();
        CustomerLedger {
            id: Uuid::new_v4(),
            customer: customer.to_string(),
            user_id: Uuid::nil(),
            initial_receivable: Decimal::from(receivable),
            initial_payable: Decimal::from(payable),
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(customer: &str, payment_type: PaymentType, amount: i64) -> AccountPayment {
        AccountPayment {
            id: Uuid::new_v4(),
            customer: customer.to_string(),
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            amount: Decimal::from(amount),
            payment_type,
            notes: None,
            user_id: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_toko_a_receivable_scenario() {
        let rows = compute_balances(
            &[tx("Toko A", TransactionKind::Sale, 5000)],
            &[ledger("Toko A", 1000, 0)],
            &[payment("Toko A", PaymentType::Receivable, 2000)],
            BalanceKind::Receivable,
        );

        assert_eq!(rows.len(), 1);
        let row = ReceivableRow::from(rows[0].clone());
        assert_eq!(row.customer, "Toko A");
        assert_eq!(row.initial_receivable, Decimal::from(1000));
        assert_eq!(row.total_sales, Decimal::from(5000));
        assert_eq!(row.total_payments_received, Decimal::from(2000));
        assert_eq!(row.final_receivable_balance, Decimal::from(4000));
    }

    #[test]
    fn test_no_ledger_no_payments_equals_gross() {
        let transactions = [
            tx("Toko B", TransactionKind::Sale, 1200),
            tx("Toko B", TransactionKind::Sale, 800),
            tx("Supplier C", TransactionKind::Purchase, 700),
        ];

        let receivable = compute_balances(&transactions, &[], &[], BalanceKind::Receivable);
        assert_eq!(receivable.len(), 1);
        assert_eq!(receivable[0].final_balance, Decimal::from(2000));
        assert_eq!(receivable[0].initial_balance, Decimal::ZERO);
        assert_eq!(receivable[0].total_payments, Decimal::ZERO);

        let payable = compute_balances(&transactions, &[], &[], BalanceKind::Payable);
        assert_eq!(payable.len(), 1);
        assert_eq!(payable[0].customer, "Supplier C");
        assert_eq!(payable[0].final_balance, Decimal::from(700));
    }

    #[test]
    fn test_ledger_only_counterparty_included_once() {
        let rows = compute_balances(
            &[tx("Toko A", TransactionKind::Sale, 100)],
            &[ledger("Toko A", 50, 0), ledger("Toko Lama", 3000, 0)],
            &[
                payment("Toko Lama", PaymentType::Receivable, 1000),
                payment("Toko Lama", PaymentType::Receivable, 500),
            ],
            BalanceKind::Receivable,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer, "Toko A");
        assert_eq!(rows[0].final_balance, Decimal::from(150));
        assert_eq!(rows[1].customer, "Toko Lama");
        assert_eq!(rows[1].gross, Decimal::ZERO);
        assert_eq!(rows[1].final_balance, Decimal::from(1500));
    }

    #[test]
    fn test_ledger_only_with_zero_balance_and_no_payments_omitted() {
        let rows = compute_balances(
            &[],
            &[ledger("Toko Kosong", 0, 900), ledger("Toko Isi", 0, 0)],
            &[payment("Toko Isi", PaymentType::Receivable, 250)],
            BalanceKind::Receivable,
        );

        // Toko Kosong only has a payable opening balance.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer, "Toko Isi");
        assert_eq!(rows[0].final_balance, Decimal::from(-250));
    }

    #[test]
    fn test_payments_of_other_type_ignored() {
        let rows = compute_balances(
            &[tx("Toko A", TransactionKind::Sale, 1000)],
            &[],
            &[
                payment("Toko A", PaymentType::Payable, 400),
                payment("Toko A", PaymentType::Receivable, 100),
            ],
            BalanceKind::Receivable,
        );
        assert_eq!(rows[0].total_payments, Decimal::from(100));
        assert_eq!(rows[0].final_balance, Decimal::from(900));
    }

    #[test]
    fn test_payments_without_ledger_or_transactions_not_reported() {
        let rows = compute_balances(
            &[],
            &[],
            &[payment("Toko Hantu", PaymentType::Receivable, 100)],
            BalanceKind::Receivable,
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_sorted_byte_wise() {
        let rows = compute_balances(
            &[
                tx("toko kecil", TransactionKind::Sale, 1),
                tx("Toko Besar", TransactionKind::Sale, 1),
            ],
            &[ledger("Apotek", 10, 0)],
            &[],
            BalanceKind::Receivable,
        );
        let names: Vec<&str> = rows.iter().map(|r| r.customer.as_str()).collect();
        assert_eq!(names, vec!["Apotek", "Toko Besar", "toko kecil"]);
    }

    #[test]
    fn test_payable_uses_payable_side() {
        let rows = compute_balances(
            &[tx("Supplier C", TransactionKind::Purchase, 10_000)],
            &[ledger("Supplier C", 999, 2500)],
            &[payment("Supplier C", PaymentType::Payable, 4000)],
            BalanceKind::Payable,
        );
        let row = PayableRow::from(rows[0].clone());
        assert_eq!(row.initial_payable, Decimal::from(2500));
        assert_eq!(row.total_purchases, Decimal::from(10_000));
        assert_eq!(row.total_payments_made, Decimal::from(4000));
        assert_eq!(row.final_payable_balance, Decimal::from(8500));
    }

    #[test]
    fn test_totals_sum_columns() {
        let rows = compute_balances(
            &[tx("A", TransactionKind::Sale, 100), tx("B", TransactionKind::Sale, 300)],
            &[ledger("A", 10, 0)],
            &[payment("B", PaymentType::Receivable, 50)],
            BalanceKind::Receivable,
        );
        let sum = totals(&rows);
        assert_eq!(sum.gross, Decimal::from(400));
        assert_eq!(sum.initial_balance, Decimal::from(10));
        assert_eq!(sum.total_payments, Decimal::from(50));
        assert_eq!(sum.final_balance, Decimal::from(360));
    }
}
