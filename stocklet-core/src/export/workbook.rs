use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::HashMap;

use crate::accounts::balance::{totals, BalanceKind, BalanceRow};
use crate::models::item::StockSummary;
use crate::models::payment::AccountPayment;
use crate::models::transaction::{Transaction, TransactionKind};
use crate::reports::TransactionTotals;

pub const MONEY_FORMAT: &str = "\"Rp\"#,##0.00";
pub const QUANTITY_FORMAT: &str = "#,##0.00";

pub const FILTERS_SHEET: &str = "filters";
pub const DATA_SHEET: &str = "data";
pub const SUMMARY_SHEET: &str = "summary";
pub const PAYMENTS_SHEET: &str = "payments";

/// Filter values echoed on the `filters` sheet.
#[derive(Debug, Clone, Default)]
pub struct ExportFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub customer: Option<String>,
    pub item: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Header,
    Bold,
    Money,
    Quantity,
    TotalMoney,
    TotalQuantity,
}

impl Style {
    pub fn num_format(self) -> Option<&'static str> {
        match self {
            Style::Money | Style::TotalMoney => Some(MONEY_FORMAT),
            Style::Quantity | Style::TotalQuantity => Some(QUANTITY_FORMAT),
            Style::Plain | Style::Header | Style::Bold => None,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(
            self,
            Style::Header | Style::Bold | Style::TotalMoney | Style::TotalQuantity
        )
    }

    fn format(self) -> Option<Format> {
        if self == Style::Plain {
            return None;
        }
        let mut format = Format::new();
        if self.is_bold() {
            format = format.set_bold();
        }
        if let Some(num_format) = self.num_format() {
            format = format.set_num_format(num_format);
        }
        Some(format)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub style: Style,
}

/// Content of one worksheet, laid out before any xlsx encoding happens.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub name: &'static str,
    cells: Vec<Cell>,
    widths: Vec<(u16, f64)>,
}

impl SheetLayout {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Vec::new(),
            widths: Vec::new(),
        }
    }

    fn text(&mut self, row: u32, col: u16, value: impl Into<String>, style: Style) {
        self.cells.push(Cell {
            row,
            col,
            value: CellValue::Text(value.into()),
            style,
        });
    }

    fn number(&mut self, row: u32, col: u16, value: Decimal, style: Style) {
        self.cells.push(Cell {
            row,
            col,
            value: CellValue::Number(value),
            style,
        });
    }

    /// Bold column titles on `row`; columns are sized to fit them.
    fn header(&mut self, row: u32, columns: &[&str]) {
        for (col, title) in columns.iter().enumerate() {
            let col = col as u16;
            self.text(row, col, *title, Style::Header);
            self.widths.push((col, (title.len() + 6).max(14) as f64));
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Index of the last row holding a cell.
    pub fn last_row(&self) -> Option<u32> {
        self.cells.iter().map(|c| c.row).max()
    }

    fn to_worksheet(&self) -> Result<Worksheet, XlsxError> {
        let mut sheet = Worksheet::new();
        sheet.set_name(self.name)?;
        for (col, width) in &self.widths {
            sheet.set_column_width(*col, *width)?;
        }

        for cell in &self.cells {
            match (&cell.value, cell.style.format()) {
                (CellValue::Text(text), None) => {
                    sheet.write_string(cell.row, cell.col, text)?;
                }
                (CellValue::Text(text), Some(format)) => {
                    sheet.write_string_with_format(cell.row, cell.col, text, &format)?;
                }
                (CellValue::Number(value), None) => {
                    sheet.write_number(cell.row, cell.col, number(*value))?;
                }
                (CellValue::Number(value), Some(format)) => {
                    sheet.write_number_with_format(cell.row, cell.col, number(*value), &format)?;
                }
            }
        }
        Ok(sheet)
    }
}

fn number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Encodes laid-out sheets as an xlsx file, in order.
pub fn render(sheets: &[SheetLayout]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    for layout in sheets {
        workbook.push_worksheet(layout.to_worksheet()?);
    }
    workbook.save_to_buffer()
}

fn filters_sheet(filters: &ExportFilters, generated_at: DateTime<Utc>) -> SheetLayout {
    let mut sheet = SheetLayout::new(FILTERS_SHEET);
    sheet.header(0, &["Filter", "Value"]);

    let entries = [
        ("Generated at", Some(generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())),
        ("Start date", filters.start_date.clone()),
        ("End date", filters.end_date.clone()),
        ("Customer", filters.customer.clone()),
        ("Item", filters.item.clone()),
        ("Search", filters.search.clone()),
    ];
    for (i, (label, value)) in entries.into_iter().enumerate() {
        let row = i as u32 + 1;
        sheet.text(row, 0, label, Style::Plain);
        sheet.text(row, 1, value.unwrap_or_else(|| "All".to_string()), Style::Plain);
    }
    sheet
}

/// `filters` plus `data` with a totals row.
pub fn transactions_layout(
    kind: TransactionKind,
    filters: &ExportFilters,
    transactions: &[Transaction],
    generated_at: DateTime<Utc>,
) -> Vec<SheetLayout> {
    let counterparty = match kind {
        TransactionKind::Sale => "Customer",
        TransactionKind::Purchase => "Supplier",
    };

    let mut data = SheetLayout::new(DATA_SHEET);
    data.header(
        0,
        &[
            "Date",
            counterparty,
            "Shipment Note",
            "Invoice",
            "Purchase Order",
            "Secondary Shipment Note",
            "Item",
            "Quantity",
            "Price",
            "Total",
        ],
    );

    for (i, tx) in transactions.iter().enumerate() {
        let row = i as u32 + 1;
        data.text(row, 0, tx.date.format("%Y-%m-%d").to_string(), Style::Plain);
        data.text(row, 1, tx.customer.as_str(), Style::Plain);
        data.text(row, 2, tx.shipment_note_number.as_deref().unwrap_or(""), Style::Plain);
        data.text(row, 3, tx.invoice_number.as_deref().unwrap_or(""), Style::Plain);
        data.text(row, 4, tx.purchase_order_number.as_deref().unwrap_or(""), Style::Plain);
        data.text(row, 5, tx.secondary_shipment_note_number.as_deref().unwrap_or(""), Style::Plain);
        data.text(row, 6, tx.item_name.as_str(), Style::Plain);
        data.number(row, 7, tx.quantity, Style::Quantity);
        data.number(row, 8, tx.price, Style::Money);
        data.number(row, 9, tx.total, Style::Money);
    }

    let summary = TransactionTotals::of(transactions);
    let total_row = transactions.len() as u32 + 1;
    data.text(total_row, 0, format!("TOTAL ({} rows)", summary.count), Style::Bold);
    data.number(total_row, 7, summary.total_quantity, Style::TotalQuantity);
    data.number(total_row, 9, summary.total_amount, Style::TotalMoney);

    vec![filters_sheet(filters, generated_at), data]
}

/// Sales or purchases export.
pub fn transactions_workbook(
    kind: TransactionKind,
    filters: &ExportFilters,
    transactions: &[Transaction],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, XlsxError> {
    render(&transactions_layout(kind, filters, transactions, generated_at))
}

/// `filters` plus one `data` row per item.
pub fn stock_layout(filters: &ExportFilters, rows: &[StockSummary], generated_at: DateTime<Utc>) -> Vec<SheetLayout> {
    let mut data = SheetLayout::new(DATA_SHEET);
    data.header(0, &["Item", "Opening Stock", "Purchased", "Sold", "Current Stock"]);
    for (i, item) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        data.text(row, 0, item.name.as_str(), Style::Plain);
        data.number(row, 1, item.initial_stock, Style::Quantity);
        data.number(row, 2, item.total_purchased, Style::Quantity);
        data.number(row, 3, item.total_sold, Style::Quantity);
        data.number(row, 4, item.current_stock, Style::Quantity);
    }

    vec![filters_sheet(filters, generated_at), data]
}

/// Stock summary export.
pub fn stock_workbook(
    filters: &ExportFilters,
    rows: &[StockSummary],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, XlsxError> {
    render(&stock_layout(filters, rows, generated_at))
}

/// Each balance row paired with its payments, oldest first.
pub fn payment_sections<'a>(
    rows: &'a [BalanceRow],
    payments: &'a [AccountPayment],
) -> Vec<(&'a BalanceRow, Vec<&'a AccountPayment>)> {
    let mut by_customer: HashMap<&str, Vec<&AccountPayment>> = HashMap::new();
    for payment in payments {
        by_customer.entry(payment.customer.as_str()).or_default().push(payment);
    }

    rows.iter()
        .map(|row| {
            let mut own = by_customer.remove(row.customer.as_str()).unwrap_or_default();
            own.sort_by(|a, b| {
                a.payment_date
                    .cmp(&b.payment_date)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            (row, own)
        })
        .collect()
}

fn balance_cells(sheet: &mut SheetLayout, row: u32, balance: &BalanceRow, money: Style) {
    sheet.number(row, 1, balance.initial_balance, money);
    sheet.number(row, 2, balance.gross, money);
    sheet.number(row, 3, balance.total_payments, money);
    sheet.number(row, 4, balance.final_balance, money);
}

/// `summary` with a TOTAL row, then `payments` with each counterparty's
/// payments listed under its balance.
pub fn accounts_layout(
    kind: BalanceKind,
    customer: Option<&str>,
    rows: &[BalanceRow],
    payments: &[AccountPayment],
    generated_at: DateTime<Utc>,
) -> Vec<SheetLayout> {
    let columns = match kind {
        BalanceKind::Receivable => [
            "Customer",
            "Initial Receivable",
            "Total Sales",
            "Payments Received",
            "Final Receivable",
        ],
        BalanceKind::Payable => [
            "Supplier",
            "Initial Payable",
            "Total Purchases",
            "Payments Made",
            "Final Payable",
        ],
    };

    let mut summary = SheetLayout::new(SUMMARY_SHEET);
    summary.text(
        0,
        0,
        format!("Generated at {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        Style::Plain,
    );
    summary.text(1, 0, format!("Customer filter: {}", customer.unwrap_or("All")), Style::Plain);
    summary.header(3, &columns);

    let mut row = 4;
    for balance in rows {
        summary.text(row, 0, balance.customer.as_str(), Style::Plain);
        balance_cells(&mut summary, row, balance, Style::Money);
        row += 1;
    }
    let sum = totals(rows);
    let total = BalanceRow {
        customer: "TOTAL".to_string(),
        initial_balance: sum.initial_balance,
        gross: sum.gross,
        total_payments: sum.total_payments,
        final_balance: sum.final_balance,
    };
    summary.text(row, 0, total.customer.as_str(), Style::Bold);
    balance_cells(&mut summary, row, &total, Style::TotalMoney);

    let mut detail = SheetLayout::new(PAYMENTS_SHEET);
    detail.header(0, &columns);
    let mut row = 1;
    for (balance, own) in payment_sections(rows, payments) {
        detail.text(row, 0, balance.customer.as_str(), Style::Bold);
        balance_cells(&mut detail, row, balance, Style::TotalMoney);
        row += 1;
        if !own.is_empty() {
            detail.text(row, 1, "Payment Date", Style::Header);
            detail.text(row, 2, "Amount", Style::Header);
            detail.text(row, 3, "Notes", Style::Header);
            row += 1;
        }
        for payment in own {
            detail.text(row, 1, payment.payment_date.format("%Y-%m-%d").to_string(), Style::Plain);
            detail.number(row, 2, payment.amount, Style::Money);
            detail.text(row, 3, payment.notes.as_deref().unwrap_or(""), Style::Plain);
            row += 1;
        }
        // blank spacer row
        row += 1;
    }

    vec![summary, detail]
}

/// Receivable or payable export.
pub fn accounts_workbook(
    kind: BalanceKind,
    customer: Option<&str>,
    rows: &[BalanceRow],
    payments: &[AccountPayment],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, XlsxError> {
    render(&accounts_layout(kind, customer, rows, payments, generated_at))
}
