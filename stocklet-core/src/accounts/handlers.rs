use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounts::balance::{totals, BalanceKind, PayableRow, ReceivableRow};
use crate::accounts::service;
use crate::auth::Session;
use crate::error::{ApiResponse, ApiResult};
use crate::filter::NameFilter;
use crate::models::ledger::{CustomerLedger, UpsertLedger};
use crate::models::payment::{AccountPayment, CreatePayment, PaymentFilter};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub customer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DistinctCustomersQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableTotals {
    pub initial_receivable: Decimal,
    pub total_sales: Decimal,
    pub total_payments_received: Decimal,
    pub final_receivable_balance: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableTotals {
    pub initial_payable: Decimal,
    pub total_purchases: Decimal,
    pub total_payments_made: Decimal,
    pub final_payable_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Report<R, T> {
    pub rows: Vec<R>,
    pub totals: T,
}

/// `GET /api/accounts/receivable`
pub async fn receivable(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Report<ReceivableRow, ReceivableTotals>> {
    let filter = NameFilter::from_query(query.customer.as_deref())?;
    let rows = service::balances(&state.db, session.user_id, BalanceKind::Receivable, filter.as_ref()).await?;

    let sum = totals(&rows);
    Ok(ApiResponse::ok(Report {
        rows: rows.into_iter().map(ReceivableRow::from).collect(),
        totals: ReceivableTotals {
            initial_receivable: sum.initial_balance,
            total_sales: sum.gross,
            total_payments_received: sum.total_payments,
            final_receivable_balance: sum.final_balance,
        },
    }))
}

/// `GET /api/accounts/payable`
pub async fn payable(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Report<PayableRow, PayableTotals>> {
    let filter = NameFilter::from_query(query.customer.as_deref())?;
    let rows = service::balances(&state.db, session.user_id, BalanceKind::Payable, filter.as_ref()).await?;

    let sum = totals(&rows);
    Ok(ApiResponse::ok(Report {
        rows: rows.into_iter().map(PayableRow::from).collect(),
        totals: PayableTotals {
            initial_payable: sum.initial_balance,
            total_purchases: sum.gross,
            total_payments_made: sum.total_payments,
            final_payable_balance: sum.final_balance,
        },
    }))
}

/// `POST /api/customer-ledger`
pub async fn upsert_ledger(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<UpsertLedger>,
) -> ApiResult<CustomerLedger> {
    let ledger = service::upsert_ledger(&state.db, session.user_id, input).await?;
    Ok(ApiResponse::ok(ledger))
}

/// `GET /api/customer-ledger`
pub async fn list_ledgers(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Vec<CustomerLedger>> {
    let filter = NameFilter::from_query(query.customer.as_deref())?;
    let rows = service::list_ledgers(&state.db, session.user_id, filter.as_ref()).await?;
    Ok(ApiResponse::ok(rows))
}

/// `POST /api/account-payments`
pub async fn create_payment(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<CreatePayment>,
) -> ApiResult<AccountPayment> {
    let payment = service::create_payment(&state.db, session.user_id, input).await?;
    Ok(ApiResponse::created(payment))
}

/// `GET /api/account-payments`
pub async fn list_payments(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<AccountPayment>> {
    let rows = service::list_payments(&state.db, session.user_id, &filter).await?;
    Ok(ApiResponse::ok(rows))
}

/// `GET /api/distinct-customers`
pub async fn distinct_customers(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DistinctCustomersQuery>,
) -> ApiResult<Vec<String>> {
    let search = NameFilter::from_query(query.q.as_deref())?;
    let names = service::distinct_customers(&state.db, session.user_id, search.as_ref(), query.limit).await?;
    Ok(ApiResponse::ok(names))
}
