pub mod balance;
pub mod handlers;
pub mod service;

pub use balance::{compute_balances, totals, BalanceKind, BalanceRow, BalanceTotals, PayableRow, ReceivableRow};
