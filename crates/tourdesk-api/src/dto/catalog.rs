//! Excursion and session DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use tourdesk_core::models::{ScheduleDraft, SessionDraft};
use tourdesk_core::AppResult;

/// Filters for the excursion list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcursionFilterParams {
    /// `me` restricts the list to the caller's excursions
    pub owner: Option<String>,
}

impl ExcursionFilterParams {
    pub fn mine(&self) -> bool {
        self.owner.as_deref() == Some("me")
    }
}

/// Session creation or update request
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    /// RFC 3339 start time
    pub start_at: String,
    pub max_participants: i32,
    #[serde(default)]
    pub cost: Decimal,
}

impl SessionRequest {
    pub fn to_draft(&self) -> AppResult<SessionDraft> {
        SessionDraft::parse(&self.start_at, self.max_participants, self.cost)
    }
}

/// Weekly schedule request
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: i16,
    /// Local `HH:MM`
    pub start_time: String,
    pub max_participants: i32,
    #[serde(default)]
    pub cost: Decimal,
    /// 0 publishes without limit
    #[serde(default)]
    pub repeats: i32,
}

impl ScheduleRequest {
    pub fn to_draft(&self) -> AppResult<ScheduleDraft> {
        ScheduleDraft::parse(
            self.weekday,
            &self.start_time,
            self.max_participants,
            self.cost,
            self.repeats,
        )
    }
}
