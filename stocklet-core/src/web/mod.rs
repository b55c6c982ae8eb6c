pub mod gate;
pub mod health;


use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::{self, require_session};
use crate::web::gate::page_gate;
use crate::{accounts, export, inventory, reports, AppState};

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::handlers::me))
        // Items
        .route(
            "/api/items",
            get(inventory::handlers::list_items).post(inventory::handlers::create_item),
        )
        .route(
            "/api/items/:id",
            get(inventory::handlers::get_item)
                .put(inventory::handlers::update_item)
                .delete(inventory::handlers::delete_item),
        )
        .route("/api/items/:id/adjust-stock", post(inventory::handlers::adjust_stock))
        .route("/api/items/:id/transactions", get(inventory::handlers::item_transactions))
        // Transactions
        .route(
            "/api/transactions",
            get(inventory::handlers::list_transactions).post(inventory::handlers::create_transaction),
        )
        .route(
            "/api/transactions/:id",
            get(inventory::handlers::get_transaction)
                .put(inventory::handlers::update_transaction)
                .delete(inventory::handlers::delete_transaction),
        )
        // Accounts
        .route("/api/accounts/receivable", get(accounts::handlers::receivable))
        .route("/api/accounts/payable", get(accounts::handlers::payable))
        .route(
            "/api/customer-ledger",
            get(accounts::handlers::list_ledgers).post(accounts::handlers::upsert_ledger),
        )
        .route(
            "/api/account-payments",
            get(accounts::handlers::list_payments).post(accounts::handlers::create_payment),
        )
        .route("/api/distinct-customers", get(accounts::handlers::distinct_customers))
        // Reports
        .route("/api/reports/sales", get(reports::handlers::sales))
        .route("/api/reports/purchases", get(reports::handlers::purchases))
        .route("/api/reports/items", get(reports::handlers::items))
        // Exports
        .route("/api/export/sales", get(export::handlers::sales))
        .route("/api/export/purchases", get(export::handlers::purchases))
        .route("/api/export/stock", get(export::handlers::stock))
        .route("/api/export/accounts", get(export::handlers::accounts))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    match origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        ),
        Err(e) => {
            warn!("Ignoring invalid CORS_ORIGIN {}: {}", origin, e);
            None
        }
    }
}

/// Creates the main application router.
///
/// Public routes are the health checks and the auth endpoints that mint or
/// drop a session; everything else under `/api` requires one. When a static
/// directory is configured it is served as the fallback behind the page gate.
pub fn create_router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/health/db", get(health::db_health_check))
        .route("/api/auth/register", post(auth::handlers::register))
        .route("/api/auth/login", post(auth::handlers::login))
        .route("/api/auth/refresh", post(auth::handlers::refresh))
        .route("/api/auth/logout", post(auth::handlers::logout))
        .merge(protected_routes(&state));

    if let Some(dir) = &state.config.static_dir {
        let files = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        let gated = ServiceBuilder::new()
            .layer(middleware::from_fn_with_state(state.clone(), page_gate))
            .service(files);
        app = app.fallback_service(gated);
    }

    let mut app = app.layer(TraceLayer::new_for_http());
    if let Some(cors) = state.config.cors_origin.as_deref().and_then(cors_layer) {
        app = app.layer(cors);
    }

    app.with_state(state)
}
