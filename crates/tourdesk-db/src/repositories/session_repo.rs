//! Session repository implementation
//!
//! Session updates take the same row lock as reservation admission, so a
//! capacity change and a booking for the same session never interleave.

use super::rows::{SessionAvailabilityRow, SessionRow};
use super::{commit, db_error, seats, PgBookingStore};
use async_trait::async_trait;
use tourdesk_core::{
    models::{Session, SessionAvailability, SessionDraft},
    traits::SessionRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument};

impl PgBookingStore {
    /// Lock a session row for the rest of the transaction
    pub(crate) async fn lock_session(
        tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
        session_id: i64,
    ) -> AppResult<Session> {
        let row = sqlx::query_as::<sqlx::Postgres, SessionRow>(
            r#"
            SELECT id, excursion_id, start_at, max_participants, cost
            FROM excursion_sessions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("lock session", e))?
        .ok_or(AppError::SessionNotFound(session_id))?;

        Ok(row.into())
    }

    /// Seats held by non-cancelled reservations, read inside `tx`
    pub(crate) async fn committed_in_tx(
        tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
        session_id: i64,
    ) -> AppResult<i32> {
        let (sum,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(participants_count), 0)::BIGINT
            FROM reservations
            WHERE session_id = $1 AND is_cancelled = FALSE
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_error("sum committed seats", e))?;

        Ok(seats(sum))
    }
}

#[async_trait]
impl SessionRepository for PgBookingStore {
    #[instrument(skip(self, draft))]
    async fn create_session(&self, excursion_id: i64, draft: &SessionDraft) -> AppResult<Session> {
        let row = sqlx::query_as::<sqlx::Postgres, SessionRow>(
            r#"
            INSERT INTO excursion_sessions (excursion_id, start_at, max_participants, cost)
            SELECT id, $2, $3, $4 FROM excursions WHERE id = $1
            RETURNING id, excursion_id, start_at, max_participants, cost
            "#,
        )
        .bind(excursion_id)
        .bind(draft.start_at)
        .bind(draft.max_participants)
        .bind(draft.cost)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("create session", e))?
        .ok_or(AppError::ExcursionNotFound(excursion_id))?;

        info!(
            "Created session {} for excursion {} ({} seats)",
            row.id, excursion_id, row.max_participants
        );
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_session(&self, id: i64) -> AppResult<Option<Session>> {
        debug!("Finding session by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, SessionRow>(
            r#"
            SELECT id, excursion_id, start_at, max_participants, cost
            FROM excursion_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find session", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_sessions(&self, excursion_id: i64) -> AppResult<Vec<SessionAvailability>> {
        let rows = sqlx::query_as::<sqlx::Postgres, SessionAvailabilityRow>(
            r#"
            SELECT s.id, s.excursion_id, s.start_at, s.max_participants, s.cost,
                   COALESCE((
                       SELECT SUM(r.participants_count)
                       FROM reservations r
                       WHERE r.session_id = s.id AND r.is_cancelled = FALSE
                   ), 0)::BIGINT AS booked
            FROM excursion_sessions s
            WHERE s.excursion_id = $1
            ORDER BY s.start_at, s.id
            "#,
        )
        .bind(excursion_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list sessions", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, draft))]
    async fn update_session(&self, id: i64, draft: &SessionDraft) -> AppResult<Session> {
        let mut tx = self.begin().await?;

        let session = Self::lock_session(&mut tx, id).await?;
        let committed = Self::committed_in_tx(&mut tx, id).await?;
        session
            .ledger(committed)
            .can_resize_to(draft.max_participants)?;

        let row = sqlx::query_as::<sqlx::Postgres, SessionRow>(
            r#"
            UPDATE excursion_sessions
            SET start_at = $2, max_participants = $3, cost = $4
            WHERE id = $1
            RETURNING id, excursion_id, start_at, max_participants, cost
            "#,
        )
        .bind(id)
        .bind(draft.start_at)
        .bind(draft.max_participants)
        .bind(draft.cost)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("update session", e))?;

        commit(tx).await?;

        info!("Updated session {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn committed_seats(&self, session_id: i64) -> AppResult<i32> {
        let (sum,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(participants_count), 0)::BIGINT
            FROM reservations
            WHERE session_id = $1 AND is_cancelled = FALSE
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("sum committed seats", e))?;

        Ok(seats(sum))
    }
}
