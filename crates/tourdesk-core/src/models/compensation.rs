//! Compensation run types
//!
//! Deleting a session or an excursion is a multi-step unit: collect active
//! reservations, refund paid ones one at a time, then persist every change in
//! a single transaction and finally notify.

use super::ledger::CompensationLedger;
use serde::Serialize;
use std::fmt;

/// What is being deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CompensationScope {
    Session(i64),
    Excursion(i64),
}

impl CompensationScope {
    /// File name of the exported ledger
    pub fn export_filename(&self) -> String {
        match self {
            CompensationScope::Session(id) => format!("cancelled_reservations_session_{}.csv", id),
            CompensationScope::Excursion(id) => {
                format!("cancelled_reservations_excursion_{}.csv", id)
            }
        }
    }
}

impl fmt::Display for CompensationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompensationScope::Session(id) => write!(f, "session {}", id),
            CompensationScope::Excursion(id) => write!(f, "excursion {}", id),
        }
    }
}

/// Orchestrator progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPhase {
    Collecting,
    Refunding,
    Cancelling,
    Persisting,
    Notifying,
    Done,
    /// Terminal, the store was left unchanged
    Aborted,
}

impl CompensationPhase {
    /// Legal forward moves of the orchestrator
    pub fn can_advance_to(self, next: CompensationPhase) -> bool {
        use CompensationPhase::*;
        matches!(
            (self, next),
            (Collecting, Refunding)
                | (Refunding, Cancelling)
                | (Cancelling, Persisting)
                | (Persisting, Notifying)
                | (Persisting, Done)
                | (Notifying, Done)
                | (Collecting, Aborted)
                | (Refunding, Aborted)
        )
    }
}

impl fmt::Display for CompensationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompensationPhase::Collecting => "collecting",
            CompensationPhase::Refunding => "refunding",
            CompensationPhase::Cancelling => "cancelling",
            CompensationPhase::Persisting => "persisting",
            CompensationPhase::Notifying => "notifying",
            CompensationPhase::Done => "done",
            CompensationPhase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Everything a compensation run persists, applied atomically by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationCommit {
    /// Set when the excursion itself (with its photos) goes too
    pub excursion_id: Option<i64>,
    /// Sessions to delete
    pub session_ids: Vec<i64>,
    /// Active reservations collected for the sessions above
    pub cancelled_reservation_ids: Vec<i64>,
    /// Payments refunded during the run
    pub refunded_payment_ids: Vec<i64>,
}

/// Outcome of a completed compensation run
#[derive(Debug, Clone, Serialize)]
pub struct CompensationReport {
    pub scope: CompensationScope,
    pub phase: CompensationPhase,
    pub deleted_sessions: Vec<i64>,
    pub refunded_payments: Vec<i64>,
    pub ledger: CompensationLedger,
    /// Rendered export of `ledger`, header only when nothing was cancelled
    #[serde(skip)]
    pub export_csv: Option<Vec<u8>>,
    /// Stored photo paths whose files should be removed
    #[serde(skip)]
    pub removed_photos: Vec<String>,
}
