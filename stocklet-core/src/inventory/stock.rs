use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

use crate::models::transaction::{Transaction, TransactionKind};

/// What a single transaction does to one item's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEffect {
    pub item_id: Uuid,
    pub kind: TransactionKind,
    pub quantity: Decimal,
}

impl StockEffect {
    pub fn delta(&self) -> Decimal {
        self.kind.stock_delta(self.quantity)
    }
}

impl From<&Transaction> for StockEffect {
    fn from(tx: &Transaction) -> Self {
        Self {
            item_id: tx.item_id,
            kind: tx.kind,
            quantity: tx.quantity,
        }
    }
}

/// Net change to one item, split into the undo of an old transaction and
/// the effect of a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub item_id: Uuid,
    pub reversal: Decimal,
    pub application: Decimal,
}

impl StockChange {
    pub fn delta(&self) -> Decimal {
        self.reversal + self.application
    }

    fn positive_part(&self) -> Decimal {
        self.reversal.max(Decimal::ZERO) + self.application.max(Decimal::ZERO)
    }

    fn negative_part(&self) -> Decimal {
        -(self.reversal.min(Decimal::ZERO) + self.application.min(Decimal::ZERO))
    }
}

/// Stock would go negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub item: String,
    pub available: Decimal,
    pub requested: Decimal,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insufficient stock for {}: available {}, requested {}",
            self.item,
            self.available.normalize(),
            self.requested.normalize()
        )
    }
}

/// Per-item changes needed to create, update or delete a transaction.
///
/// Changes are ordered by item id, which is also the order rows are locked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPlan {
    changes: Vec<StockChange>,
}

impl StockPlan {
    pub fn for_create(new: StockEffect) -> Self {
        Self::build(None, Some(new))
    }

    /// Reverses `old` on its item and applies `new` on its item. When both
    /// name the same item they fold into one change.
    pub fn for_update(old: StockEffect, new: StockEffect) -> Self {
        Self::build(Some(old), Some(new))
    }

    pub fn for_delete(old: StockEffect) -> Self {
        Self::build(Some(old), None)
    }

    fn build(old: Option<StockEffect>, new: Option<StockEffect>) -> Self {
        let mut changes: Vec<StockChange> = Vec::with_capacity(2);

        if let Some(old) = old {
            changes.push(StockChange {
                item_id: old.item_id,
                reversal: -old.delta(),
                application: Decimal::ZERO,
            });
        }

        if let Some(new) = new {
            match changes.iter_mut().find(|c| c.item_id == new.item_id) {
                Some(existing) => existing.application = new.delta(),
                None => changes.push(StockChange {
                    item_id: new.item_id,
                    reversal: Decimal::ZERO,
                    application: new.delta(),
                }),
            }
        }

        changes.sort_by_key(|c| c.item_id);
        Self { changes }
    }

    pub fn changes(&self) -> &[StockChange] {
        &self.changes
    }
}

/// Applies `change` to an item holding `current` stock.
///
/// Returns the new stock, or a shortfall if it would drop below zero.
pub fn settle(item_name: &str, current: Decimal, change: &StockChange) -> Result<Decimal, StockShortfall> {
    let next = current + change.delta();
    if next < Decimal::ZERO {
        return Err(StockShortfall {
            item: item_name.to_string(),
            available: current + change.positive_part(),
            requested: change.negative_part(),
        });
    }
    Ok(next)
}
