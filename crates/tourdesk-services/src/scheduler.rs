//! Recurring schedules
//!
//! Organizers register a weekly slot once; sessions for it are published
//! `horizon_days` ahead, on creation and on every housekeeping pass.

use crate::managed_excursion;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tourdesk_core::{
    models::{Actor, RecurringSchedule, ScheduleDraft, Session},
    traits::BookingStore,
    AppError, AppResult,
};
use tracing::{debug, info, instrument, warn};

/// A schedule with the sessions published from it in one pass
#[derive(Debug, Clone, Serialize)]
pub struct PublishedSchedule {
    #[serde(flatten)]
    pub schedule: RecurringSchedule,
    pub published: Vec<Session>,
}

/// Outcome of a pass over every schedule
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleRun {
    pub schedules: usize,
    pub published: Vec<Session>,
    pub failed: Vec<i64>,
}

pub struct ScheduleService {
    store: Arc<dyn BookingStore>,
    tz: Tz,
    horizon_days: u32,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn BookingStore>, tz: Tz, horizon_days: u32) -> Self {
        Self {
            store,
            tz,
            horizon_days,
        }
    }

    /// Today in the display timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Register a weekly slot and publish its first weeks right away
    #[instrument(skip(self, actor, draft), fields(actor_id = actor.user_id))]
    pub async fn create_schedule(
        &self,
        actor: &Actor,
        excursion_id: i64,
        draft: ScheduleDraft,
    ) -> AppResult<PublishedSchedule> {
        managed_excursion(self.store.as_ref(), actor, excursion_id).await?;

        let schedule = self.store.create_schedule(excursion_id, &draft).await?;
        let published = self.publish(&schedule, self.today()).await?;
        info!(
            "Schedule {} on weekday {} at {} published {} sessions",
            schedule.id,
            schedule.weekday,
            schedule.start_time,
            published.len()
        );

        let schedule = self
            .store
            .find_schedule(schedule.id)
            .await?
            .ok_or(AppError::ScheduleNotFound(schedule.id))?;
        Ok(PublishedSchedule {
            schedule,
            published,
        })
    }

    pub async fn list_schedules(
        &self,
        actor: &Actor,
        excursion_id: i64,
    ) -> AppResult<Vec<RecurringSchedule>> {
        managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        self.store.list_schedules(Some(excursion_id)).await
    }

    /// Stop a schedule. Sessions it already published are kept.
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete_schedule(
        &self,
        actor: &Actor,
        excursion_id: i64,
        schedule_id: i64,
    ) -> AppResult<()> {
        managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        self.store
            .find_schedule(schedule_id)
            .await?
            .filter(|s| s.excursion_id == excursion_id)
            .ok_or(AppError::ScheduleNotFound(schedule_id))?;

        if !self.store.delete_schedule(schedule_id).await? {
            return Err(AppError::ScheduleNotFound(schedule_id));
        }
        info!("Schedule {} removed from excursion {}", schedule_id, excursion_id);
        Ok(())
    }

    /// Publish upcoming sessions for every schedule, starting from `today`
    ///
    /// One failing schedule does not stop the others; its id is reported.
    #[instrument(skip(self))]
    pub async fn publish_upcoming(&self, today: NaiveDate) -> AppResult<ScheduleRun> {
        let schedules = self.store.list_schedules(None).await?;
        let mut run = ScheduleRun {
            schedules: schedules.len(),
            ..ScheduleRun::default()
        };

        for schedule in schedules.iter().filter(|s| !s.is_exhausted()) {
            match self.publish(schedule, today).await {
                Ok(sessions) => run.published.extend(sessions),
                Err(AppError::ScheduleNotFound(id)) => {
                    debug!("Schedule {} removed during the pass", id)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to publish sessions for schedule {}", schedule.id);
                    run.failed.push(schedule.id);
                }
            }
        }

        if !run.published.is_empty() {
            info!(
                "Published {} scheduled sessions from {} schedules",
                run.published.len(),
                run.schedules
            );
        }
        Ok(run)
    }

    async fn publish(&self, schedule: &RecurringSchedule, today: NaiveDate) -> AppResult<Vec<Session>> {
        let now = Utc::now();
        let candidates: Vec<_> = schedule
            .occurrences(today, self.horizon_days, self.tz)
            .into_iter()
            .filter(|start| *start > now)
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        self.store.materialize_schedule(schedule.id, &candidates).await
    }
}
