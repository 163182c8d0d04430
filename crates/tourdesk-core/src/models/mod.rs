//! Domain models for Tourdesk
//!
//! This module contains all the core domain models used throughout the application.

pub mod compensation;
pub mod excursion;
pub mod ledger;
pub mod payment;
pub mod reservation;
pub mod schedule;
pub mod session;
pub mod user;

pub use compensation::{
    CompensationCommit, CompensationPhase, CompensationReport, CompensationScope,
};
pub use excursion::{Excursion, ExcursionPhoto, NewExcursion};
pub use ledger::{format_local, CompensationLedger, LedgerRow};
pub use payment::{
    ChargeMetadata, ChargeRequest, ChargeResult, GatewayEvent, NewPayment, Payment,
    PaymentStatus, RefundRequest, RefundResult, StatusChange,
};
pub use reservation::{
    ConfirmOutcome, ConfirmStep, Contact, Reservation, ReservationDraft, ReservationState,
};
pub use schedule::{RecurringSchedule, ScheduleDraft};
pub use session::{parse_start_time, Session, SessionAvailability, SessionDraft, MAX_AMOUNT};
pub use user::{Actor, UserRole};
