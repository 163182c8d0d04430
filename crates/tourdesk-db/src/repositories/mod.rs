//! Repository implementations
//!
//! `PgBookingStore` implements every repository trait defined in
//! tourdesk-core, using sqlx for PostgreSQL access. The implementations are
//! split per aggregate; row mapping lives in [`rows`].

pub mod compensation_repo;
pub mod excursion_repo;
pub mod payment_repo;
pub mod reservation_repo;
mod rows;
pub mod schedule_repo;
pub mod session_repo;

use sqlx::PgPool;
use tourdesk_core::AppError;
use tracing::error;

/// PostgreSQL implementation of the booking store
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }
}

/// Log and wrap a query failure
pub(crate) fn db_error(action: &str, e: sqlx::Error) -> AppError {
    error!("Database error, failed to {}: {}", action, e);
    AppError::Database(format!("Failed to {}: {}", action, e))
}

/// Commit, mapping failures to `Transaction`
pub(crate) async fn commit(tx: sqlx::Transaction<'static, sqlx::Postgres>) -> Result<(), AppError> {
    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction: {}", e);
        AppError::Transaction(format!("Failed to commit transaction: {}", e))
    })
}

/// Narrow a seat sum coming back as BIGINT
pub(crate) fn seats(sum: i64) -> i32 {
    i32::try_from(sum).unwrap_or(i32::MAX)
}
