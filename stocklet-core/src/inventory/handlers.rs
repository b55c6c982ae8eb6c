use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ApiResponse, ApiResult};
use crate::filter::NameFilter;
use crate::inventory::{items, transactions};
use crate::models::item::{AdjustStock, CreateItem, Item, UpdateItem};
use crate::models::transaction::{Transaction, TransactionFilter, TransactionInput};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// `GET /api/items`
pub async fn list_items(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Item>> {
    let search = NameFilter::from_query(query.search.as_deref())?;
    Ok(ApiResponse::ok(items::list_items(&state.db, search.as_ref()).await?))
}

/// `POST /api/items`
pub async fn create_item(
    State(state): State<AppState>,
    _session: Session,
    Json(input): Json<CreateItem>,
) -> ApiResult<Item> {
    Ok(ApiResponse::created(items::create_item(&state.db, input).await?))
}

/// `GET /api/items/:id`
pub async fn get_item(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Item> {
    Ok(ApiResponse::ok(items::get_item(&state.db, id).await?))
}

/// `PUT /api/items/:id`
pub async fn update_item(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateItem>,
) -> ApiResult<Item> {
    Ok(ApiResponse::ok(items::update_item(&state.db, id, input).await?))
}

/// `DELETE /api/items/:id`
pub async fn delete_item(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Item> {
    Ok(ApiResponse::ok(items::delete_item(&state.db, id).await?))
}

/// `POST /api/items/:id/adjust-stock`
pub async fn adjust_stock(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<AdjustStock>,
) -> ApiResult<Item> {
    Ok(ApiResponse::ok(items::adjust_stock(&state.db, id, input).await?))
}

/// `GET /api/items/:id/transactions`
pub async fn item_transactions(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Transaction>> {
    items::get_item(&state.db, id).await?;
    let filter = TransactionFilter {
        item_id: Some(id),
        ..TransactionFilter::default()
    };
    let rows = transactions::list_transactions(&state.db, session.user_id, &filter).await?;
    Ok(ApiResponse::ok(rows))
}

/// `GET /api/transactions`
pub async fn list_transactions(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<Transaction>> {
    let rows = transactions::list_transactions(&state.db, session.user_id, &filter).await?;
    Ok(ApiResponse::ok(rows))
}

/// `POST /api/transactions`
pub async fn create_transaction(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<TransactionInput>,
) -> ApiResult<Transaction> {
    let created = transactions::create_transaction(&state.db, session.user_id, input).await?;
    Ok(ApiResponse::created(created))
}

/// `GET /api/transactions/:id`
pub async fn get_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Transaction> {
    let tx = transactions::get_transaction(&state.db, session.user_id, id).await?;
    Ok(ApiResponse::ok(tx))
}

/// `PUT /api/transactions/:id`
pub async fn update_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<TransactionInput>,
) -> ApiResult<Transaction> {
    let updated = transactions::update_transaction(&state.db, session.user_id, id, input).await?;
    Ok(ApiResponse::ok(updated))
}

/// `DELETE /api/transactions/:id`
pub async fn delete_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult<Transaction> {
    let deleted = transactions::delete_transaction(&state.db, session.user_id, id).await?;
    Ok(ApiResponse::ok(deleted))
}
