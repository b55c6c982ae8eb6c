use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store of revoked token ids.
///
/// Entries carry the token's own expiry; once it passes the entry is dead
/// weight and `purge_expired` may drop it.
#[async_trait]
pub trait Denylist: Send + Sync {
    /// Records `jti` as revoked. Revoking twice is a no-op.
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), anyhow::Error>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error>;

    /// Deletes entries whose expiry is at or before `now`, returning how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, anyhow::Error>;
}

/// Denylist backed by the `revoked_tokens` table.
#[derive(Clone)]
pub struct PgDenylist {
    pool: PgPool,
}

impl PgDenylist {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Denylist for PgDenylist {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (id, jti, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE jti = $1")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, anyhow::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-process denylist, used by tests and tooling that run without Postgres.
#[derive(Default)]
pub struct MemoryDenylist {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl Denylist for MemoryDenylist {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), anyhow::Error> {
        self.entries
            .write()
            .await
            .entry(jti.to_string())
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, anyhow::Error> {
        Ok(self.entries.read().await.contains_key(jti))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, anyhow::Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
