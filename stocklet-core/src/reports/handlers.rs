use axum::extract::{Query, State};

use crate::auth::Session;
use crate::error::{ApiResponse, ApiResult};
use crate::filter::NameFilter;
use crate::inventory::handlers::SearchQuery;
use crate::inventory::items::stock_summary;
use crate::models::item::StockSummary;
use crate::models::transaction::{TransactionFilter, TransactionKind};
use crate::reports::summary::{transaction_report, TransactionReport};
use crate::AppState;

/// `GET /api/reports/sales`
pub async fn sales(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<TransactionReport> {
    let report = transaction_report(&state.db, session.user_id, TransactionKind::Sale, filter).await?;
    Ok(ApiResponse::ok(report))
}

/// `GET /api/reports/purchases`
pub async fn purchases(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<TransactionReport> {
    let report = transaction_report(&state.db, session.user_id, TransactionKind::Purchase, filter).await?;
    Ok(ApiResponse::ok(report))
}

/// `GET /api/reports/items`
pub async fn items(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<StockSummary>> {
    let search = NameFilter::from_query(query.search.as_deref())?;
    Ok(ApiResponse::ok(stock_summary(&state.db, search.as_ref()).await?))
}
