//! Compensation commit
//!
//! Persists a whole compensation run in one transaction. Sessions are locked
//! first so no booking can slip in between the conflict check and the delete.

use super::{commit, db_error, PgBookingStore};
use async_trait::async_trait;
use std::collections::HashSet;
use tourdesk_core::{
    models::CompensationCommit, traits::CompensationRepository, AppError, AppResult,
};
use tracing::{info, instrument, warn};

#[async_trait]
impl CompensationRepository for PgBookingStore {
    #[instrument(skip(self, commit_plan), fields(excursion_id = ?commit_plan.excursion_id, sessions = commit_plan.session_ids.len()))]
    async fn commit_compensation(&self, commit_plan: &CompensationCommit) -> AppResult<Vec<String>> {
        let mut tx = self.begin().await?;

        if let Some(excursion_id) = commit_plan.excursion_id {
            let locked: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM excursions WHERE id = $1 FOR UPDATE")
                    .bind(excursion_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_error("lock excursion", e))?;
            if locked.is_none() {
                return Err(AppError::ExcursionNotFound(excursion_id));
            }

            let current: Vec<(i64,)> =
                sqlx::query_as("SELECT id FROM excursion_sessions WHERE excursion_id = $1")
                    .bind(excursion_id)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| db_error("list excursion sessions", e))?;
            let planned: HashSet<i64> = commit_plan.session_ids.iter().copied().collect();
            if let Some((extra,)) = current.iter().find(|(id,)| !planned.contains(id)) {
                warn!(
                    "Excursion {} gained session {} during compensation",
                    excursion_id, extra
                );
                return Err(AppError::Conflict(format!(
                    "excursion {} gained session {} while being deleted, retry",
                    excursion_id, extra
                )));
            }
        }

        // Lock in id order to avoid deadlocks between concurrent deletions
        let mut session_ids = commit_plan.session_ids.clone();
        session_ids.sort_unstable();
        for session_id in &session_ids {
            Self::lock_session(&mut tx, *session_id).await.map_err(|e| match e {
                AppError::SessionNotFound(id) => {
                    AppError::Conflict(format!("session {} disappeared during compensation", id))
                }
                other => other,
            })?;
        }

        let active: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM reservations
            WHERE session_id = ANY($1) AND is_cancelled = FALSE
            "#,
        )
        .bind(&session_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("list active reservations", e))?;

        let planned: HashSet<i64> = commit_plan.cancelled_reservation_ids.iter().copied().collect();
        if let Some((unplanned,)) = active.iter().find(|(id,)| !planned.contains(id)) {
            warn!("Reservation {} appeared during compensation", unplanned);
            return Err(AppError::Conflict(format!(
                "reservation {} was booked while its session was being deleted, retry",
                unplanned
            )));
        }

        sqlx::query(
            r#"
            UPDATE reservations
            SET is_cancelled = TRUE
            WHERE id = ANY($1) AND is_cancelled = FALSE
            "#,
        )
        .bind(&commit_plan.cancelled_reservation_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("cancel reservations", e))?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'refunded', updated_at = NOW()
            WHERE id = ANY($1) AND status = 'succeeded'
            "#,
        )
        .bind(&commit_plan.refunded_payment_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark payments refunded", e))?;

        // Reservations and payments go with their sessions
        sqlx::query("DELETE FROM excursion_sessions WHERE id = ANY($1)")
            .bind(&session_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete sessions", e))?;

        let mut removed_photos = Vec::new();
        if let Some(excursion_id) = commit_plan.excursion_id {
            let photos: Vec<(String,)> = sqlx::query_as(
                "DELETE FROM excursion_photos WHERE excursion_id = $1 RETURNING photo_url",
            )
            .bind(excursion_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("delete excursion photos", e))?;
            removed_photos = photos.into_iter().map(|(url,)| url).collect();

            sqlx::query("DELETE FROM excursions WHERE id = $1")
                .bind(excursion_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("delete excursion", e))?;
        }

        commit(tx).await?;

        info!(
            "Committed compensation: {} sessions deleted, {} reservations cancelled, {} payments refunded",
            session_ids.len(),
            commit_plan.cancelled_reservation_ids.len(),
            commit_plan.refunded_payment_ids.len()
        );
        Ok(removed_photos)
    }
}
