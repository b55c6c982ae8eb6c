use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::filter::NameFilter;
use crate::inventory::stock::{settle, StockChange};
use crate::models::amount;
use crate::models::item::{AdjustStock, CreateItem, Item, StockSummary, UpdateItem};

const ITEM_COLUMNS: &str = "id, name, initial_stock, current_stock, created_at, updated_at";

fn item_not_found() -> AppError {
    AppError::NotFound("Item not found".to_string())
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("An item with this name already exists".to_string()),
        other => other,
    }
}

pub async fn list_items(pool: &PgPool, search: Option<&NameFilter>) -> Result<Vec<Item>, AppError> {
    let items = match search {
        Some(filter) => {
            sqlx::query_as::<_, Item>(&format!(
                "SELECT {} FROM items WHERE name ~* $1 ORDER BY name ASC",
                ITEM_COLUMNS
            ))
            .bind(filter.pattern())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Item>(&format!("SELECT {} FROM items ORDER BY name ASC", ITEM_COLUMNS))
                .fetch_all(pool)
                .await?
        }
    };
    Ok(items)
}

pub async fn get_item(pool: &PgPool, id: Uuid) -> Result<Item, AppError> {
    sqlx::query_as::<_, Item>(&format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(item_not_found)
}

fn check_opening_stock(value: Decimal) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::Validation("stokAwal must not be negative".to_string()));
    }
    amount::check_quantity("stokAwal", value).map_err(AppError::Validation)
}

pub async fn create_item(pool: &PgPool, input: CreateItem) -> Result<Item, AppError> {
    input.validate()?;
    check_opening_stock(input.initial_stock)?;

    let item = sqlx::query_as::<_, Item>(&format!(
        r#"
        INSERT INTO items (id, name, initial_stock, current_stock)
        VALUES ($1, $2, $3, $3)
        RETURNING {}
        "#,
        ITEM_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(input.name.trim())
    .bind(input.initial_stock)
    .fetch_one(pool)
    .await
    .map_err(duplicate_name)?;

    info!("Created item {} ({})", item.name, item.id);
    Ok(item)
}

/// Locks the item row for the rest of `tx`.
pub async fn lock_item(tx: &mut PgTransaction<'_, Postgres>, id: Uuid) -> Result<Item, AppError> {
    sqlx::query_as::<_, Item>(&format!("SELECT {} FROM items WHERE id = $1 FOR UPDATE", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(item_not_found)
}

async fn write_stock(
    tx: &mut PgTransaction<'_, Postgres>,
    id: Uuid,
    initial_stock: Decimal,
    current_stock: Decimal,
) -> Result<Item, AppError> {
    let item = sqlx::query_as::<_, Item>(&format!(
        r#"
        UPDATE items
        SET initial_stock = $2, current_stock = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        ITEM_COLUMNS
    ))
    .bind(id)
    .bind(initial_stock)
    .bind(current_stock)
    .fetch_one(&mut **tx)
    .await?;
    Ok(item)
}

/// Locks the item, settles `change` against it and writes the new stock.
pub async fn apply_change(
    tx: &mut PgTransaction<'_, Postgres>,
    change: &StockChange,
) -> Result<Item, AppError> {
    let item = lock_item(tx, change.item_id).await?;
    let next = settle(&item.name, item.current_stock, change)?;
    write_stock(tx, item.id, item.initial_stock, next).await
}

/// Renames an item and/or changes its opening stock. The current stock moves
/// by the same amount as the opening stock.
pub async fn update_item(pool: &PgPool, id: Uuid, input: UpdateItem) -> Result<Item, AppError> {
    input.validate()?;

    let mut tx = pool.begin().await?;
    let item = lock_item(&mut tx, id).await?;

    let mut updated = item.clone();
    if let Some(initial_stock) = input.initial_stock {
        check_opening_stock(initial_stock)?;
        let change = StockChange {
            item_id: id,
            reversal: -item.initial_stock,
            application: initial_stock,
        };
        let current_stock = settle(&item.name, item.current_stock, &change)?;
        updated = write_stock(&mut tx, id, initial_stock, current_stock).await?;
    }

    if let Some(name) = input.name.as_deref().map(str::trim) {
        if name != item.name {
            updated = sqlx::query_as::<_, Item>(&format!(
                "UPDATE items SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                ITEM_COLUMNS
            ))
            .bind(id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(duplicate_name)?;
        }
    }

    tx.commit().await?;
    info!("Updated item {}", id);
    Ok(updated)
}

/// Manual correction of the current stock.
pub async fn adjust_stock(pool: &PgPool, id: Uuid, input: AdjustStock) -> Result<Item, AppError> {
    if input.adjustment.is_zero() {
        return Err(AppError::Validation("adjustment must not be 0".to_string()));
    }
    amount::check_quantity("adjustment", input.adjustment).map_err(AppError::Validation)?;

    let mut tx = pool.begin().await?;
    let change = StockChange {
        item_id: id,
        reversal: Decimal::ZERO,
        application: input.adjustment,
    };
    let item = apply_change(&mut tx, &change).await?;
    tx.commit().await?;

    info!(
        "Adjusted stock of {} by {} ({})",
        item.name,
        input.adjustment,
        input.reason.as_deref().unwrap_or("no reason given")
    );
    Ok(item)
}

/// Deletes an item that no transaction references.
pub async fn delete_item(pool: &PgPool, id: Uuid) -> Result<Item, AppError> {
    let mut tx = pool.begin().await?;
    let item = lock_item(&mut tx, id).await?;

    let (references,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE item_id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if references > 0 {
        return Err(AppError::Conflict(format!(
            "Item {} is used by {} transaction(s) and cannot be deleted",
            item.name, references
        )));
    }

    sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Deleted item {} ({})", item.name, item.id);
    Ok(item)
}

/// Per-item opening stock, purchased and sold quantities, and current stock.
///
/// Quantities cover every user's transactions, matching the global stock.
pub async fn stock_summary(pool: &PgPool, search: Option<&NameFilter>) -> Result<Vec<StockSummary>, AppError> {
    let rows = sqlx::query_as::<_, StockSummary>(
        r#"
        SELECT
            i.id,
            i.name,
            i.initial_stock,
            COALESCE(SUM(t.quantity) FILTER (WHERE t.kind = 'PURCHASE'), 0) AS total_purchased,
            COALESCE(SUM(t.quantity) FILTER (WHERE t.kind = 'SALE'), 0) AS total_sold,
            i.current_stock
        FROM items i
        LEFT JOIN transactions t ON t.item_id = i.id
        WHERE ($1::text IS NULL OR i.name ~* $1)
        GROUP BY i.id, i.name, i.initial_stock, i.current_stock
        ORDER BY i.name ASC
        "#,
    )
    .bind(search.map(NameFilter::pattern))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_opening_stock_checks() {
        assert!(check_opening_stock(Decimal::ZERO).is_ok());
        assert!(check_opening_stock(Decimal::from_str("12.125").unwrap()).is_ok());
        assert!(matches!(
            check_opening_stock(Decimal::from(-1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_opening_stock(Decimal::from_str("0.0001").unwrap()),
            Err(AppError::Validation(_))
        ));
    }
}
