pub mod handlers;
pub mod workbook;

pub use workbook::{accounts_workbook, stock_workbook, transactions_workbook, ExportFilters};
