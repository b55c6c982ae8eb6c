pub mod handlers;
pub mod summary;

pub use summary::{transaction_report, TransactionReport, TransactionTotals};
