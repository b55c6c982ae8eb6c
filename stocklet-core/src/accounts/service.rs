use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::accounts::balance::{compute_balances, BalanceKind, BalanceRow};
use crate::error::AppError;
use crate::filter::NameFilter;
use crate::inventory::transactions::TRANSACTION_COLUMNS;
use crate::models::amount;
use crate::models::ledger::{CustomerLedger, UpsertLedger};
use crate::models::payment::{AccountPayment, CreatePayment, PaymentFilter, PaymentType};
use crate::models::transaction::Transaction;

const LEDGER_COLUMNS: &str =
    "id, customer, user_id, initial_receivable, initial_payable, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, customer, payment_date, amount, payment_type, notes, user_id, created_at";

pub const DEFAULT_CUSTOMER_LIMIT: usize = 20;
pub const MAX_CUSTOMER_LIMIT: usize = 100;

/// Balance rows of `kind` for the user, optionally narrowed by counterparty name.
pub async fn balances(
    pool: &PgPool,
    user_id: Uuid,
    kind: BalanceKind,
    customer: Option<&NameFilter>,
) -> Result<Vec<BalanceRow>, AppError> {
    let (transactions, ledgers, payments) = tokio::try_join!(
        transactions_of_kind(pool, user_id, kind),
        list_ledgers(pool, user_id, None),
        list_payments_of_type(pool, user_id, kind.payment_type()),
    )?;

    let mut rows = compute_balances(&transactions, &ledgers, &payments, kind);
    if let Some(filter) = customer {
        rows.retain(|row| filter.matches(&row.customer));
    }
    Ok(rows)
}

async fn transactions_of_kind(
    pool: &PgPool,
    user_id: Uuid,
    kind: BalanceKind,
) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} FROM transactions WHERE user_id = $1 AND kind = $2",
        TRANSACTION_COLUMNS
    ))
    .bind(user_id)
    .bind(kind.transaction_kind())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn list_payments_of_type(
    pool: &PgPool,
    user_id: Uuid,
    payment_type: PaymentType,
) -> Result<Vec<AccountPayment>, AppError> {
    let filter = PaymentFilter {
        customer: None,
        payment_type: Some(payment_type),
    };
    list_payments(pool, user_id, &filter).await
}

/// Creates or updates the user's ledger row for a counterparty.
///
/// Balances left out of `input` keep their stored value, or 0 on insert.
pub async fn upsert_ledger(pool: &PgPool, user_id: Uuid, input: UpsertLedger) -> Result<CustomerLedger, AppError> {
    input.validate()?;
    for (field, value) in [
        ("initialReceivable", input.initial_receivable),
        ("initialPayable", input.initial_payable),
    ] {
        if let Some(value) = value {
            amount::check_money(field, value, amount::MONEY_DIGITS).map_err(AppError::Validation)?;
        }
    }

    let ledger = sqlx::query_as::<_, CustomerLedger>(&format!(
        r#"
        INSERT INTO customer_ledgers (id, customer, user_id, initial_receivable, initial_payable)
        VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 0))
        ON CONFLICT (customer, user_id) DO UPDATE
        SET
            initial_receivable = COALESCE($4, customer_ledgers.initial_receivable),
            initial_payable = COALESCE($5, customer_ledgers.initial_payable),
            updated_at = NOW()
        RETURNING {}
        "#,
        LEDGER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(input.customer.trim())
    .bind(user_id)
    .bind(input.initial_receivable)
    .bind(input.initial_payable)
    .fetch_one(pool)
    .await?;

    info!("Upserted ledger for {} ({})", ledger.customer, ledger.id);
    Ok(ledger)
}

pub async fn list_ledgers(
    pool: &PgPool,
    user_id: Uuid,
    customer: Option<&NameFilter>,
) -> Result<Vec<CustomerLedger>, AppError> {
    let rows = sqlx::query_as::<_, CustomerLedger>(&format!(
        r#"
        SELECT {} FROM customer_ledgers
        WHERE user_id = $1 AND ($2::text IS NULL OR customer ~* $2)
        ORDER BY customer ASC
        "#,
        LEDGER_COLUMNS
    ))
    .bind(user_id)
    .bind(customer.map(NameFilter::pattern))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create_payment(pool: &PgPool, user_id: Uuid, input: CreatePayment) -> Result<AccountPayment, AppError> {
    input.validate()?;
    if input.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be greater than 0".to_string()));
    }
    amount::check_money("amount", input.amount, amount::MONEY_DIGITS).map_err(AppError::Validation)?;

    let payment = sqlx::query_as::<_, AccountPayment>(&format!(
        r#"
        INSERT INTO account_payments (id, customer, payment_date, amount, payment_type, notes, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(input.customer.trim())
    .bind(input.payment_date)
    .bind(input.amount)
    .bind(input.payment_type)
    .bind(&input.notes)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    info!(
        "Recorded {:?} payment {} of {} for {}",
        payment.payment_type, payment.id, payment.amount, payment.customer
    );
    Ok(payment)
}

/// The user's payments, oldest first.
pub async fn list_payments(
    pool: &PgPool,
    user_id: Uuid,
    filter: &PaymentFilter,
) -> Result<Vec<AccountPayment>, AppError> {
    let customer = NameFilter::from_query(filter.customer.as_deref())?;

    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM account_payments WHERE user_id = ",
        PAYMENT_COLUMNS
    ));
    query.push_bind(user_id);

    if let Some(customer) = &customer {
        query.push(" AND customer ~* ").push_bind(customer.pattern().to_string());
    }
    if let Some(payment_type) = filter.payment_type {
        query.push(" AND payment_type = ").push_bind(payment_type);
    }
    query.push(" ORDER BY payment_date ASC, created_at ASC");

    let rows = query.build_query_as::<AccountPayment>().fetch_all(pool).await?;
    Ok(rows)
}

/// Counterparty names known from the user's transactions and ledgers.
pub async fn distinct_customers(
    pool: &PgPool,
    user_id: Uuid,
    search: Option<&NameFilter>,
    limit: Option<usize>,
) -> Result<Vec<String>, AppError> {
    let pattern = search.map(NameFilter::pattern);

    let from_transactions = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT customer FROM transactions WHERE user_id = $1 AND ($2::text IS NULL OR customer ~* $2)",
    )
    .bind(user_id)
    .bind(pattern)
    .fetch_all(pool);

    let from_ledgers = sqlx::query_scalar::<_, String>(
        "SELECT customer FROM customer_ledgers WHERE user_id = $1 AND ($2::text IS NULL OR customer ~* $2)",
    )
    .bind(user_id)
    .bind(pattern)
    .fetch_all(pool);

    let (transaction_names, ledger_names) = tokio::try_join!(from_transactions, from_ledgers)?;

    Ok(merge_names(transaction_names, ledger_names, limit))
}

fn merge_names(first: Vec<String>, second: Vec<String>, limit: Option<usize>) -> Vec<String> {
    let limit = limit
        .unwrap_or(DEFAULT_CUSTOMER_LIMIT)
        .clamp(1, MAX_CUSTOMER_LIMIT);

    first
        .into_iter()
        .chain(second)
        .filter(|name| !name.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::{TransactionInput, TransactionKind};
    use chrono::NaiveDate;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_names_dedupes_and_sorts() {
        let merged = merge_names(
            names(&["Toko B", "Toko A", "Supplier C"]),
            names(&["Toko A", "Toko Lama", ""]),
            None,
        );
        assert_eq!(merged, names(&["Supplier C", "Toko A", "Toko B", "Toko Lama"]));
    }

    #[test]
    fn test_merge_names_limits() {
        let many: Vec<String> = (0..150).map(|i| format!("Toko {:03}", i)).collect();
        assert_eq!(merge_names(many.clone(), vec![], None).len(), DEFAULT_CUSTOMER_LIMIT);
        assert_eq!(merge_names(many.clone(), vec![], Some(500)).len(), MAX_CUSTOMER_LIMIT);
        assert_eq!(merge_names(many.clone(), vec![], Some(0)).len(), 1);
        assert_eq!(merge_names(many, vec![], Some(5))[4], "Toko 004");
    }

    async fn create_test_pool() -> Result<PgPool, anyhow::Error> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL not set for tests"))?;

        let pool = PgPool::connect(&database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(pool)
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_toko_a_receivable_from_store() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, 'x')")
            .bind(user_id)
            .bind(format!("{}@example.com", user_id))
            .execute(&pool)
            .await
            .unwrap();

        let item = crate::inventory::items::create_item(
            &pool,
            crate::models::item::CreateItem {
                name: format!("Besi Beton {}", Uuid::new_v4()),
                initial_stock: Decimal::from(100),
            },
        )
        .await
        .unwrap();

        upsert_ledger(
            &pool,
            user_id,
            UpsertLedger {
                customer: "Toko A".to_string(),
                initial_receivable: Some(Decimal::from(1000)),
                initial_payable: None,
            },
        )
        .await
        .unwrap();

        crate::inventory::transactions::create_transaction(
            &pool,
            user_id,
            TransactionInput {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                kind: TransactionKind::Sale,
                customer: "Toko A".to_string(),
                shipment_note_number: None,
                invoice_number: None,
                purchase_order_number: None,
                secondary_shipment_note_number: None,
                item_id: item.id,
                quantity: Decimal::from(5),
                price: Decimal::from(1000),
            },
        )
        .await
        .unwrap();

        create_payment(
            &pool,
            user_id,
            CreatePayment {
                customer: "Toko A".to_string(),
                payment_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                amount: Decimal::from(2000),
                payment_type: PaymentType::Receivable,
                notes: None,
            },
        )
        .await
        .unwrap();

        let rows = balances(&pool, user_id, BalanceKind::Receivable, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].final_balance, Decimal::from(4000));

        // A second upsert without initialReceivable keeps the stored value.
        let ledger = upsert_ledger(
            &pool,
            user_id,
            UpsertLedger {
                customer: "Toko A".to_string(),
                initial_receivable: None,
                initial_payable: Some(Decimal::from(300)),
            },
        )
        .await
        .unwrap();
        assert_eq!(ledger.initial_receivable, Decimal::from(1000));
        assert_eq!(ledger.initial_payable, Decimal::from(300));

        let customers = distinct_customers(&pool, user_id, None, None).await.unwrap();
        assert_eq!(customers, vec!["Toko A".to_string()]);
    }

    #[tokio::test]
    async fn test_payment_amount_must_be_positive() {
        // Rejected before any query runs.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stocklet")
            .unwrap();
        let result = create_payment(
            &pool,
            Uuid::new_v4(),
            CreatePayment {
                customer: "Toko A".to_string(),
                payment_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                amount: Decimal::ZERO,
                payment_type: PaymentType::Receivable,
                notes: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_amounts_finer_than_cents_rejected() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/stocklet")
            .unwrap();
        let payment = create_payment(
            &pool,
            Uuid::new_v4(),
            CreatePayment {
                customer: "Toko A".to_string(),
                payment_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                amount: Decimal::new(10005, 3),
                payment_type: PaymentType::Receivable,
                notes: None,
            },
        )
        .await;
        assert!(matches!(payment, Err(AppError::Validation(_))));

        let ledger = upsert_ledger(
            &pool,
            Uuid::new_v4(),
            UpsertLedger {
                customer: "Toko A".to_string(),
                initial_receivable: None,
                initial_payable: Some(Decimal::new(1, 3)),
            },
        )
        .await;
        assert!(matches!(ledger, Err(AppError::Validation(_))));
    }
}
