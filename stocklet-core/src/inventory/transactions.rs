use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction as PgTransaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::filter::NameFilter;
use crate::inventory::items::apply_change;
use crate::inventory::stock::{StockEffect, StockPlan};
use crate::models::item::Item;
use crate::models::transaction::{Transaction, TransactionFilter, TransactionInput};

pub(crate) const TRANSACTION_COLUMNS: &str = "id, date, kind, customer, shipment_note_number, \
     invoice_number, purchase_order_number, secondary_shipment_note_number, item_id, item_name, \
     quantity, price, total, user_id, created_at, updated_at";

fn transaction_not_found() -> AppError {
    AppError::NotFound("Transaction not found".to_string())
}

/// Validates `input` and returns the total to store with it.
fn check_input(input: &TransactionInput) -> Result<Decimal, AppError> {
    input.validate()?;
    input.check_amounts().map_err(AppError::Validation)?;
    input.total().map_err(AppError::Validation)
}

fn effect_of(input: &TransactionInput) -> StockEffect {
    StockEffect {
        item_id: input.item_id,
        kind: input.kind,
        quantity: input.quantity,
    }
}

/// Applies every change of `plan` inside `tx`, returning the updated items.
async fn apply_plan(
    tx: &mut PgTransaction<'_, Postgres>,
    plan: &StockPlan,
) -> Result<HashMap<Uuid, Item>, AppError> {
    let mut items = HashMap::with_capacity(plan.changes().len());
    for change in plan.changes() {
        let item = apply_change(tx, change).await?;
        items.insert(item.id, item);
    }
    Ok(items)
}

async fn lock_transaction(
    tx: &mut PgTransaction<'_, Postgres>,
    user_id: Uuid,
    id: Uuid,
) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} FROM transactions WHERE id = $1 AND user_id = $2 FOR UPDATE",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(transaction_not_found)
}

/// Records a transaction and moves the item's stock in the same database
/// transaction. A SALE larger than the stock on hand is rejected.
pub async fn create_transaction(
    pool: &PgPool,
    user_id: Uuid,
    input: TransactionInput,
) -> Result<Transaction, AppError> {
    let total = check_input(&input)?;

    let mut tx = pool.begin().await?;
    let items = apply_plan(&mut tx, &StockPlan::for_create(effect_of(&input))).await?;
    let item = items.get(&input.item_id).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Stock plan did not touch item {}", input.item_id))
    })?;

    let created = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        INSERT INTO transactions (
            id, date, kind, customer, shipment_note_number, invoice_number,
            purchase_order_number, secondary_shipment_note_number, item_id, item_name,
            quantity, price, total, user_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(input.date)
    .bind(input.kind)
    .bind(input.customer.trim())
    .bind(&input.shipment_note_number)
    .bind(&input.invoice_number)
    .bind(&input.purchase_order_number)
    .bind(&input.secondary_shipment_note_number)
    .bind(item.id)
    .bind(&item.name)
    .bind(input.quantity)
    .bind(input.price)
    .bind(total)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "Created {} {} of {} x {} for {}",
        created.kind, created.id, created.quantity, created.item_name, created.customer
    );
    Ok(created)
}

/// Rewrites a transaction. The old stock effect is undone on the item it
/// referenced and the new effect applied to the item it now references.
pub async fn update_transaction(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    input: TransactionInput,
) -> Result<Transaction, AppError> {
    let total = check_input(&input)?;

    let mut tx = pool.begin().await?;
    let existing = lock_transaction(&mut tx, user_id, id).await?;

    let plan = StockPlan::for_update(StockEffect::from(&existing), effect_of(&input));
    let items = apply_plan(&mut tx, &plan).await?;
    let item = items.get(&input.item_id).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Stock plan did not touch item {}", input.item_id))
    })?;

    let updated = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        UPDATE transactions
        SET
            date = $3,
            kind = $4,
            customer = $5,
            shipment_note_number = $6,
            invoice_number = $7,
            purchase_order_number = $8,
            secondary_shipment_note_number = $9,
            item_id = $10,
            item_name = $11,
            quantity = $12,
            price = $13,
            total = $14,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .bind(input.date)
    .bind(input.kind)
    .bind(input.customer.trim())
    .bind(&input.shipment_note_number)
    .bind(&input.invoice_number)
    .bind(&input.purchase_order_number)
    .bind(&input.secondary_shipment_note_number)
    .bind(item.id)
    .bind(&item.name)
    .bind(input.quantity)
    .bind(input.price)
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Updated transaction {}", id);
    Ok(updated)
}

/// Removes a transaction after undoing its stock effect.
pub async fn delete_transaction(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Transaction, AppError> {
    let mut tx = pool.begin().await?;
    let existing = lock_transaction(&mut tx, user_id, id).await?;

    apply_plan(&mut tx, &StockPlan::for_delete(StockEffect::from(&existing))).await?;

    sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("Deleted transaction {}", id);
    Ok(existing)
}

pub async fn get_transaction(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {} FROM transactions WHERE id = $1 AND user_id = $2",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(transaction_not_found)
}

/// The user's transactions matching `filter`, oldest first.
pub async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>, AppError> {
    let customer = NameFilter::from_query(filter.customer.as_deref())?;

    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM transactions WHERE user_id = ",
        TRANSACTION_COLUMNS
    ));
    query.push_bind(user_id);

    if let Some(kind) = filter.kind {
        query.push(" AND kind = ").push_bind(kind);
    }
    if let Some(customer) = &customer {
        query.push(" AND customer ~* ").push_bind(customer.pattern().to_string());
    }
    if let Some(item_id) = filter.item_id {
        query.push(" AND item_id = ").push_bind(item_id);
    }
    if let Some(start) = filter.start_date {
        query.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND date <= ").push_bind(end);
    }
    query.push(" ORDER BY date ASC, created_at ASC");

    let rows = query.build_query_as::<Transaction>().fetch_all(pool).await?;
    Ok(rows)
}
