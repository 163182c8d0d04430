//! Reservation repository implementation
//!
//! Admission locks the session row and checks the capacity ledger inside the
//! same transaction as the insert. State transitions are compare-and-set
//! updates guarded by `is_cancelled = FALSE`.

use super::rows::ReservationRow;
use super::{commit, db_error, PgBookingStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tourdesk_core::{
    models::{Reservation, ReservationDraft, ReservationState},
    traits::ReservationRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument, warn};

#[async_trait]
impl ReservationRepository for PgBookingStore {
    #[instrument(skip(self, draft), fields(session_id = draft.session_id, seats = draft.participants_count))]
    async fn admit_reservation(&self, draft: &ReservationDraft) -> AppResult<Reservation> {
        let mut tx = self.begin().await?;

        // Serializes every admission for this session
        let session = Self::lock_session(&mut tx, draft.session_id).await?;
        let committed = Self::committed_in_tx(&mut tx, draft.session_id).await?;

        if let Err(e) = session.ledger(committed).admit(draft.participants_count) {
            warn!(
                "Rejecting booking for session {}: {} requested, {}/{} committed",
                session.id, draft.participants_count, committed, session.max_participants
            );
            return Err(e);
        }

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            INSERT INTO reservations (
                session_id, user_id, full_name, phone_number, email,
                participants_count, is_paid
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, session_id, user_id, full_name, phone_number, email,
                      participants_count, is_paid, is_cancelled, booked_at
            "#,
        )
        .bind(draft.session_id)
        .bind(draft.user_id)
        .bind(&draft.contact.full_name)
        .bind(&draft.contact.phone_number)
        .bind(&draft.contact.email)
        .bind(draft.participants_count)
        .bind(draft.is_paid)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert reservation", e))?;

        commit(tx).await?;

        info!(
            "Admitted reservation {} for session {} ({} seats)",
            row.id, row.session_id, row.participants_count
        );
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_reservation(&self, id: i64) -> AppResult<Option<Reservation>> {
        debug!("Finding reservation by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find reservation", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_reservations(
        &self,
        session_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE ($1::BIGINT IS NULL OR session_id = $1)
            ORDER BY booked_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list reservations", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_user_reservations(&self, user_id: i64) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE user_id = $1
            ORDER BY booked_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list user reservations", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn active_reservations(&self, session_id: i64) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE session_id = $1 AND is_cancelled = FALSE
            ORDER BY id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list active reservations", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn cancel_reservation(
        &self,
        id: i64,
        from: ReservationState,
        refunded_payment: Option<i64>,
    ) -> AppResult<Reservation> {
        from.cancel(id)?;
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            UPDATE reservations
            SET is_cancelled = TRUE
            WHERE id = $1 AND is_cancelled = FALSE AND is_paid = $2
            RETURNING id, session_id, user_id, full_name, phone_number, email,
                      participants_count, is_paid, is_cancelled, booked_at
            "#,
        )
        .bind(id)
        .bind(from == ReservationState::Paid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("cancel reservation", e))?;

        let Some(row) = row else {
            let current: Option<(bool,)> =
                sqlx::query_as("SELECT is_cancelled FROM reservations WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_error("find reservation", e))?;

            return Err(match current {
                None => AppError::ReservationNotFound(id),
                Some((true,)) => AppError::AlreadyCancelled(id),
                Some((false,)) => {
                    warn!("Reservation {} left state {:?} before cancellation", id, from);
                    AppError::Conflict(format!("reservation {} changed state, retry", id))
                }
            });
        };

        if let Some(payment_id) = refunded_payment {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = 'refunded', updated_at = NOW()
                WHERE id = $1 AND reservation_id = $2 AND status = 'succeeded'
                "#,
            )
            .bind(payment_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("mark payment refunded", e))?;
        }

        commit(tx).await?;

        info!("Cancelled reservation {}", id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn stale_unpaid_reservations(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE is_paid = FALSE AND is_cancelled = FALSE AND booked_at < $1
            ORDER BY booked_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list stale reservations", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
