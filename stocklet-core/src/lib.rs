pub mod accounts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod inventory;
pub mod models;
pub mod reports;
pub mod web;
pub mod worker;

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;

/// Application state containing shared resources.
///
/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,
    pub auth: AuthService,
    pub config: Arc<Config>,
}
