//! Postgres backend. Each aggregate lives in its own submodule; check-then-act
//! sequences rely on unique indexes, conditional updates, row locks or
//! transaction-scoped advisory locks rather than application-side checks.

mod conversations;
mod engagement;
mod keys;
mod messages;
mod sessions;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Store, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Serialize concurrent transactions touching the same logical key until
/// the surrounding transaction ends.
async fn advisory_lock(
    tx: &mut Transaction<'_, Postgres>,
    scope: &str,
    key: &str,
) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("{scope}:{key}"))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(what.to_string())
}

fn key_id_from_db(key_id: i64) -> StoreResult<u32> {
    u32::try_from(key_id).map_err(|_| corrupt(format!("key id {key_id} out of range")))
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
