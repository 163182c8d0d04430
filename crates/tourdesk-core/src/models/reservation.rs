//! Reservation model and state machine
//!
//! A reservation is a claim on seats in a session. Its state is derived from
//! two flags:
//!
//! | is_paid | is_cancelled | state     |
//! |---------|--------------|-----------|
//! | false   | false        | pending   |
//! | true    | false        | paid      |
//! | any     | true         | cancelled |
//!
//! `is_cancelled` is a one-way latch. A cancelled reservation keeps its
//! `is_paid` flag so the export can tell refunded bookings apart.

use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Reservation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Seats are held, waiting for the gateway to confirm payment
    Pending,
    /// Payment confirmed (or the session is free)
    Paid,
    /// Terminal
    Cancelled,
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationState::Pending => write!(f, "pending"),
            ReservationState::Paid => write!(f, "paid"),
            ReservationState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a confirm request should do given the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStep {
    /// pending -> paid
    Apply,
    /// already paid, repeated confirmation
    NoOp,
}

impl ReservationState {
    pub fn from_flags(is_paid: bool, is_cancelled: bool) -> Self {
        match (is_paid, is_cancelled) {
            (_, true) => ReservationState::Cancelled,
            (true, false) => ReservationState::Paid,
            (false, false) => ReservationState::Pending,
        }
    }

    /// Whether the reservation still holds seats
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, ReservationState::Cancelled)
    }

    /// Check `pending -> paid`.
    ///
    /// Repeated confirmations are no-ops. A cancelled reservation can never be
    /// confirmed.
    pub fn confirm(self, reservation_id: i64) -> AppResult<ConfirmStep> {
        match self {
            ReservationState::Pending => Ok(ConfirmStep::Apply),
            ReservationState::Paid => Ok(ConfirmStep::NoOp),
            ReservationState::Cancelled => Err(AppError::InvalidTransition(format!(
                "reservation {} is cancelled and cannot become paid",
                reservation_id
            ))),
        }
    }

    /// Check `pending|paid -> cancelled`.
    pub fn cancel(self, reservation_id: i64) -> AppResult<ReservationState> {
        match self {
            ReservationState::Pending | ReservationState::Paid => Ok(ReservationState::Cancelled),
            ReservationState::Cancelled => Err(AppError::AlreadyCancelled(reservation_id)),
        }
    }
}

/// Contact snapshot captured at booking time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Contact {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,

    #[validate(length(min = 3, max = 50))]
    pub phone_number: String,

    #[validate(email)]
    pub email: String,
}

/// Reservation entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: i64,
    pub session_id: i64,
    /// Booking owner
    pub user_id: i64,
    #[serde(flatten)]
    pub contact: Contact,
    pub participants_count: i32,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub booked_at: DateTime<Utc>,
}

impl Reservation {
    #[inline]
    pub fn state(&self) -> ReservationState {
        ReservationState::from_flags(self.is_paid, self.is_cancelled)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_cancelled
    }

    /// Unpaid, not cancelled and booked before `cutoff`
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.state() == ReservationState::Pending && self.booked_at < cutoff
    }
}

/// A reservation about to be admitted
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub session_id: i64,
    pub user_id: i64,
    pub contact: Contact,
    pub participants_count: i32,
    /// Set for free sessions, which are confirmed at creation
    pub is_paid: bool,
}

/// Result of applying a payment confirmation in the store
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// The reservation moved from pending to paid
    Confirmed(Reservation),
    /// It was already paid, nothing changed
    AlreadyPaid(Reservation),
    /// It was cancelled before the confirmation arrived
    ReservationCancelled(Reservation),
}

impl ConfirmOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            ConfirmOutcome::Confirmed(r)
            | ConfirmOutcome::AlreadyPaid(r)
            | ConfirmOutcome::ReservationCancelled(r) => r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservation(is_paid: bool, is_cancelled: bool) -> Reservation {
        Reservation {
            id: 1,
            session_id: 1,
            user_id: 1,
            contact: Contact {
                full_name: "Anna Petrova".to_string(),
                phone_number: "+79001234567".to_string(),
                email: "anna@example.com".to_string(),
            },
            participants_count: 2,
            is_paid,
            is_cancelled,
            booked_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_from_flags() {
        assert_eq!(reservation(false, false).state(), ReservationState::Pending);
        assert_eq!(reservation(true, false).state(), ReservationState::Paid);
        assert_eq!(reservation(true, true).state(), ReservationState::Cancelled);
        assert_eq!(reservation(false, true).state(), ReservationState::Cancelled);
    }

    #[test]
    fn test_confirm_transitions() {
        assert_eq!(ReservationState::Pending.confirm(1).unwrap(), ConfirmStep::Apply);
        assert_eq!(ReservationState::Paid.confirm(1).unwrap(), ConfirmStep::NoOp);
        assert!(matches!(
            ReservationState::Cancelled.confirm(1),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_cancel_is_terminal() {
        assert_eq!(
            ReservationState::Pending.cancel(9).unwrap(),
            ReservationState::Cancelled
        );
        assert_eq!(
            ReservationState::Paid.cancel(9).unwrap(),
            ReservationState::Cancelled
        );
        assert!(matches!(
            ReservationState::Cancelled.cancel(9),
            Err(AppError::AlreadyCancelled(9))
        ));
    }

    #[test]
    fn test_stale_only_for_pending() {
        let cutoff = Utc::now() + Duration::minutes(1);
        assert!(reservation(false, false).is_stale(cutoff));
        assert!(!reservation(true, false).is_stale(cutoff));
        assert!(!reservation(false, true).is_stale(cutoff));

        let earlier = Utc::now() - Duration::minutes(15);
        assert!(!reservation(false, false).is_stale(earlier));
    }

    #[test]
    fn test_contact_validation() {
        let contact = Contact {
            full_name: String::new(),
            phone_number: "1".to_string(),
            email: "nope".to_string(),
        };
        let errors = contact.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 3);
    }
}
