//! Capacity ledger
//!
//! Seat accounting for a single session. Committed seats are the sum of
//! `participants_count` over every reservation that is not cancelled, pending
//! or paid. Free bookings are paid at creation so the same rule covers both
//! session kinds.
//!
//! The ledger itself is pure. Stores evaluate [`CapacityLedger::admit`] while
//! holding the session lock so that the check and the insert form one unit.

use crate::error::AppError;
use crate::AppResult;
use serde::Serialize;

/// Committed versus maximum seats for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityLedger {
    pub session_id: i64,
    pub capacity: i32,
    pub committed: i32,
}

impl CapacityLedger {
    pub fn new(session_id: i64, capacity: i32, committed: i32) -> Self {
        Self {
            session_id,
            capacity,
            committed,
        }
    }

    /// Seats still free. Never negative, even if the data is already over.
    #[inline]
    pub fn available(&self) -> i32 {
        (self.capacity - self.committed).max(0)
    }

    /// Admit `requested` seats iff `committed + requested <= capacity`.
    ///
    /// Returns the ledger after admission.
    pub fn admit(&self, requested: i32) -> AppResult<CapacityLedger> {
        if requested < 1 {
            return Err(AppError::Validation(format!(
                "participants_count must be >= 1, got {}",
                requested
            )));
        }

        let total = i64::from(self.committed) + i64::from(requested);
        if total > i64::from(self.capacity) {
            return Err(AppError::CapacityExceeded {
                session_id: self.session_id,
                requested,
                available: self.available(),
            });
        }

        Ok(CapacityLedger {
            committed: self.committed + requested,
            ..*self
        })
    }

    /// Whether the capacity can be lowered to `new_capacity` without stranding
    /// seats that are already committed.
    pub fn can_resize_to(&self, new_capacity: i32) -> AppResult<()> {
        if new_capacity < self.committed {
            return Err(AppError::Validation(format!(
                "session {} has {} committed seats, capacity cannot drop to {}",
                self.session_id, self.committed, new_capacity
            )));
        }
        Ok(())
    }
}
