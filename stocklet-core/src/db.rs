use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Owned handle to the Postgres connection pool.
///
/// Opened once at process start and closed explicitly on shutdown. Request
/// handlers reach the pool through `AppState`, never through a global.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects to `database_url` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, anyhow::Error> {
        let pool = create_pool(database_url, max_connections).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Waits for in-flight connections to be returned, then closes the pool.
    pub async fn close(self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Create a Postgres connection pool for `database_url`.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}
