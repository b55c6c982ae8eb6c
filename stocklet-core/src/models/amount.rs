//! Precision limits of the `NUMERIC` columns quantities and money land in.
//!
//! Values outside these limits are rejected before they reach Postgres.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for stock quantities, `NUMERIC(18,3)`.
pub const QUANTITY_SCALE: u32 = 3;

/// Decimal places kept for money, `NUMERIC(18,2)` and `NUMERIC(20,2)`.
pub const MONEY_SCALE: u32 = 2;

/// Integer digits of a quantity or stock level.
pub const QUANTITY_DIGITS: u32 = 15;

/// Integer digits of a unit price.
pub const PRICE_DIGITS: u32 = 16;

/// Integer digits of a line total, ledger balance or payment.
pub const MONEY_DIGITS: u32 = 18;

fn within(value: Decimal, digits: u32) -> bool {
    value.abs() < Decimal::from(10u64.pow(digits))
}

/// Checks a quantity (or signed stock change) fits the stock columns exactly.
pub fn check_quantity(field: &str, value: Decimal) -> Result<(), String> {
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(format!("{} allows at most {} decimal places", field, QUANTITY_SCALE));
    }
    if !within(value, QUANTITY_DIGITS) {
        return Err(format!("{} is too large", field));
    }
    Ok(())
}

/// Checks a money value with at most `digits` integer digits.
pub fn check_money(field: &str, value: Decimal, digits: u32) -> Result<(), String> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(format!("{} allows at most {} decimal places", field, MONEY_SCALE));
    }
    if !within(value, digits) {
        return Err(format!("{} is too large", field));
    }
    Ok(())
}

/// `quantity * price` rounded to cents the way Postgres rounds `NUMERIC`.
///
/// Fails instead of overflowing, and when the result would not fit a
/// money column.
pub fn line_total(quantity: Decimal, price: Decimal) -> Result<Decimal, String> {
    let total = quantity
        .checked_mul(price)
        .ok_or_else(|| "total is too large".to_string())?
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    check_money("total", total, MONEY_DIGITS)?;
    Ok(total)
}
