//! Session model
//!
//! A session is one scheduled, capacity-bounded occurrence of an excursion.

use crate::capacity::CapacityLedger;
use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest amount a `NUMERIC(10, 2)` column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique identifier
    pub id: i64,

    /// Owning excursion
    pub excursion_id: i64,

    /// When the session starts
    pub start_at: DateTime<Utc>,

    /// Seat capacity (>= 0)
    pub max_participants: i32,

    /// Cost per participant, zero for free sessions
    pub cost: Decimal,
}

impl Session {
    /// Free sessions skip the payment flow entirely
    #[inline]
    pub fn is_free(&self) -> bool {
        self.cost.is_zero()
    }

    /// Amount due for a booking of `participants` seats
    ///
    /// `None` when the amount cannot be charged as a single payment.
    pub fn total_cost(&self, participants: i32) -> Option<Decimal> {
        self.cost
            .checked_mul(Decimal::from(participants))
            .filter(|total| *total <= MAX_AMOUNT)
    }

    /// Capacity ledger for this session given the seats already committed
    pub fn ledger(&self, committed: i32) -> CapacityLedger {
        CapacityLedger::new(self.id, self.max_participants, committed)
    }
}

/// Session together with its seat accounting
#[derive(Debug, Clone, Serialize)]
pub struct SessionAvailability {
    #[serde(flatten)]
    pub session: Session,
    pub booked: i32,
    pub available: i32,
}

impl SessionAvailability {
    pub fn new(session: Session, booked: i32) -> Self {
        let available = session.ledger(booked).available();
        Self {
            session,
            booked,
            available,
        }
    }
}

/// Validated input for creating or updating a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub start_at: DateTime<Utc>,
    pub max_participants: i32,
    pub cost: Decimal,
}

impl SessionDraft {
    /// Build a draft from raw request values.
    ///
    /// The start time must be RFC 3339, capacity must be non-negative and the
    /// cost non-negative with at most two decimal places.
    pub fn parse(start_at: &str, max_participants: i32, cost: Decimal) -> AppResult<Self> {
        let start_at = parse_start_time(start_at)?;
        let cost = check_seats_and_cost(max_participants, cost)?;

        Ok(Self {
            start_at,
            max_participants,
            cost,
        })
    }
}

/// Capacity and price rules shared by sessions and recurring schedules.
/// Returns the cost rounded to two places.
pub(crate) fn check_seats_and_cost(max_participants: i32, cost: Decimal) -> AppResult<Decimal> {
    if max_participants < 0 {
        return Err(AppError::Validation(format!(
            "max_participants must be >= 0, got {}",
            max_participants
        )));
    }

    if cost.is_sign_negative() && !cost.is_zero() {
        return Err(AppError::Validation(format!(
            "cost must be >= 0, got {}",
            cost
        )));
    }

    if cost > MAX_AMOUNT {
        return Err(AppError::Validation(format!(
            "cost must be at most {}, got {}",
            MAX_AMOUNT, cost
        )));
    }

    if cost.normalize().scale() > 2 {
        return Err(AppError::Validation(format!(
            "cost must have at most 2 decimal places, got {}",
            cost
        )));
    }

    Ok(cost.round_dp(2))
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_start_time(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Validation(format!("invalid start time '{}': {}", raw, e)))
}
