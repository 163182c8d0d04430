//! Recurring schedule repository implementation
//!
//! Materialization locks the schedule row, so two scheduler runs cannot both
//! publish the same week or overrun the repeat limit.

use super::rows::{ScheduleRow, SessionRow};
use super::{commit, db_error, PgBookingStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tourdesk_core::{
    models::{RecurringSchedule, ScheduleDraft, Session},
    traits::ScheduleRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument};

#[async_trait]
impl ScheduleRepository for PgBookingStore {
    #[instrument(skip(self, draft))]
    async fn create_schedule(
        &self,
        excursion_id: i64,
        draft: &ScheduleDraft,
    ) -> AppResult<RecurringSchedule> {
        let row = sqlx::query_as::<sqlx::Postgres, ScheduleRow>(
            r#"
            INSERT INTO recurring_schedules (
                excursion_id, weekday, start_time, max_participants, cost, repeats
            )
            SELECT id, $2, $3, $4, $5, $6 FROM excursions WHERE id = $1
            RETURNING id, excursion_id, weekday, start_time, max_participants, cost,
                      repeats, count_of_repeats
            "#,
        )
        .bind(excursion_id)
        .bind(draft.weekday)
        .bind(draft.start_time)
        .bind(draft.max_participants)
        .bind(draft.cost)
        .bind(draft.repeats)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("create schedule", e))?
        .ok_or(AppError::ExcursionNotFound(excursion_id))?;

        info!("Created schedule {} for excursion {}", row.id, excursion_id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_schedule(&self, id: i64) -> AppResult<Option<RecurringSchedule>> {
        let row = sqlx::query_as::<sqlx::Postgres, ScheduleRow>(
            r#"
            SELECT id, excursion_id, weekday, start_time, max_participants, cost,
                   repeats, count_of_repeats
            FROM recurring_schedules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find schedule", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_schedules(&self, excursion_id: Option<i64>) -> AppResult<Vec<RecurringSchedule>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ScheduleRow>(
            r#"
            SELECT id, excursion_id, weekday, start_time, max_participants, cost,
                   repeats, count_of_repeats
            FROM recurring_schedules
            WHERE ($1::BIGINT IS NULL OR excursion_id = $1)
            ORDER BY id
            "#,
        )
        .bind(excursion_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list schedules", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn delete_schedule(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM recurring_schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete schedule", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    async fn materialize_schedule(
        &self,
        schedule_id: i64,
        candidates: &[DateTime<Utc>],
    ) -> AppResult<Vec<Session>> {
        let mut tx = self.begin().await?;

        let schedule: RecurringSchedule = sqlx::query_as::<sqlx::Postgres, ScheduleRow>(
            r#"
            SELECT id, excursion_id, weekday, start_time, max_participants, cost,
                   repeats, count_of_repeats
            FROM recurring_schedules
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock schedule", e))?
        .ok_or(AppError::ScheduleNotFound(schedule_id))?
        .into();

        let existing: Vec<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT start_at FROM excursion_sessions
            WHERE excursion_id = $1 AND start_at = ANY($2)
            "#,
        )
        .bind(schedule.excursion_id)
        .bind(candidates)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("find existing sessions", e))?;
        let existing: HashSet<DateTime<Utc>> = existing.into_iter().map(|(at,)| at).collect();

        let mut created = Vec::new();
        for start_at in schedule.plan(candidates, &existing) {
            let draft = schedule.session_draft(start_at);
            let row = sqlx::query_as::<sqlx::Postgres, SessionRow>(
                r#"
                INSERT INTO excursion_sessions (excursion_id, start_at, max_participants, cost)
                VALUES ($1, $2, $3, $4)
                RETURNING id, excursion_id, start_at, max_participants, cost
                "#,
            )
            .bind(schedule.excursion_id)
            .bind(draft.start_at)
            .bind(draft.max_participants)
            .bind(draft.cost)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("publish scheduled session", e))?;
            created.push(Session::from(row));
        }

        if !created.is_empty() {
            sqlx::query(
                "UPDATE recurring_schedules SET count_of_repeats = count_of_repeats + $2 WHERE id = $1",
            )
            .bind(schedule_id)
            .bind(created.len() as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("advance schedule repeats", e))?;
        }

        commit(tx).await?;

        debug!(
            "Schedule {} published {} sessions",
            schedule_id,
            created.len()
        );
        Ok(created)
    }
}
