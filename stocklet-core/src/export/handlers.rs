use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::accounts::balance::BalanceKind;
use crate::accounts::service;
use crate::auth::Session;
use crate::error::AppError;
use crate::export::workbook::{accounts_workbook, stock_workbook, transactions_workbook, ExportFilters};
use crate::filter::NameFilter;
use crate::inventory::handlers::SearchQuery;
use crate::inventory::items::{get_item, stock_summary};
use crate::inventory::transactions::list_transactions;
use crate::models::payment::PaymentFilter;
use crate::models::transaction::{TransactionFilter, TransactionKind};
use crate::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct AccountsExportQuery {
    pub kind: BalanceKind,
    pub customer: Option<String>,
}

pub fn attachment_name(name: &str, generated_at: DateTime<Utc>) -> String {
    format!("{}-{}.xlsx", name, generated_at.format("%Y-%m-%d"))
}

fn xlsx_response(name: &str, generated_at: DateTime<Utc>, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", attachment_name(name, generated_at));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

fn workbook_error(err: rust_xlsxwriter::XlsxError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Failed to build workbook: {}", err))
}

async fn export_transactions(
    state: &AppState,
    session: &Session,
    kind: TransactionKind,
    filter: TransactionFilter,
) -> Result<Response, AppError> {
    let filter = TransactionFilter {
        kind: Some(kind),
        ..filter
    };
    let item = match filter.item_id {
        Some(id) => Some(get_item(&state.db, id).await?.name),
        None => None,
    };
    let transactions = list_transactions(&state.db, session.user_id, &filter).await?;

    let filters = ExportFilters {
        start_date: filter.start_date.map(|d| d.to_string()),
        end_date: filter.end_date.map(|d| d.to_string()),
        customer: filter.customer.clone(),
        item,
        search: None,
    };
    let generated_at = Utc::now();
    let bytes = transactions_workbook(kind, &filters, &transactions, generated_at).map_err(workbook_error)?;

    let name = match kind {
        TransactionKind::Sale => "sales",
        TransactionKind::Purchase => "purchases",
    };
    info!("Exported {} {} rows for user {}", transactions.len(), name, session.user_id);
    Ok(xlsx_response(name, generated_at, bytes))
}

/// `GET /api/export/sales`
pub async fn sales(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<TransactionFilter>,
) -> Result<Response, AppError> {
    export_transactions(&state, &session, TransactionKind::Sale, filter).await
}

/// `GET /api/export/purchases`
pub async fn purchases(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<TransactionFilter>,
) -> Result<Response, AppError> {
    export_transactions(&state, &session, TransactionKind::Purchase, filter).await
}

/// `GET /api/export/stock`
pub async fn stock(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let search = NameFilter::from_query(query.search.as_deref())?;
    let rows = stock_summary(&state.db, search.as_ref()).await?;

    let filters = ExportFilters {
        search: query.search,
        ..ExportFilters::default()
    };
    let generated_at = Utc::now();
    let bytes = stock_workbook(&filters, &rows, generated_at).map_err(workbook_error)?;
    Ok(xlsx_response("stock", generated_at, bytes))
}

/// `GET /api/export/accounts`
pub async fn accounts(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AccountsExportQuery>,
) -> Result<Response, AppError> {
    let customer = NameFilter::from_query(query.customer.as_deref())?;
    let payment_filter = PaymentFilter {
        customer: None,
        payment_type: Some(query.kind.payment_type()),
    };
    let (rows, payments) = tokio::try_join!(
        service::balances(&state.db, session.user_id, query.kind, customer.as_ref()),
        service::list_payments(&state.db, session.user_id, &payment_filter),
    )?;

    let generated_at = Utc::now();
    let bytes = accounts_workbook(query.kind, query.customer.as_deref(), &rows, &payments, generated_at)
        .map_err(workbook_error)?;

    let name = match query.kind {
        BalanceKind::Receivable => "receivable",
        BalanceKind::Payable => "payable",
    };
    Ok(xlsx_response(name, generated_at, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_attachment_name_carries_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 23, 10, 0).unwrap();
        assert_eq!(attachment_name("sales", at), "sales-2024-03-05.xlsx");
    }

    #[test]
    fn test_xlsx_response_headers() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let response = xlsx_response("stock", at, b"PK".to_vec());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"stock-2024-03-05.xlsx\""
        );
    }
}
