//! Common traits for repositories and services
//!
//! Defines the seams between the booking core and its collaborators: the
//! store, the payment gateway, the notification sink, the cache and photo
//! storage.

use crate::error::AppError;
use crate::models::{
    ChargeRequest, ChargeResult, CompensationCommit, ConfirmOutcome, Excursion, ExcursionPhoto,
    NewExcursion, NewPayment, Payment, RecurringSchedule, RefundRequest, RefundResult,
    Reservation, ReservationDraft, ReservationState, ScheduleDraft, Session, SessionAvailability,
    SessionDraft,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Excursion catalogue
#[async_trait]
pub trait ExcursionRepository: Send + Sync {
    /// Create an excursion owned by `owner_id`, with its photos
    async fn create_excursion(
        &self,
        owner_id: i64,
        input: &NewExcursion,
    ) -> Result<Excursion, AppError>;

    /// Find excursion by ID
    async fn find_excursion(&self, id: i64) -> Result<Option<Excursion>, AppError>;

    /// List excursions, optionally only those owned by `owner_id`
    async fn list_excursions(
        &self,
        owner_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Excursion>, AppError>;

    /// Photos of an excursion ordered by `order_index`
    async fn list_photos(&self, excursion_id: i64) -> Result<Vec<ExcursionPhoto>, AppError>;
}

/// Session inventory
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        excursion_id: i64,
        draft: &SessionDraft,
    ) -> Result<Session, AppError>;

    async fn find_session(&self, id: i64) -> Result<Option<Session>, AppError>;

    /// Sessions of an excursion with their seat accounting, by start time
    async fn list_sessions(&self, excursion_id: i64)
        -> Result<Vec<SessionAvailability>, AppError>;

    /// Update a session. Capacity cannot drop below the committed seats; the
    /// check runs under the same lock as admission.
    async fn update_session(&self, id: i64, draft: &SessionDraft) -> Result<Session, AppError>;

    /// Seats held by non-cancelled reservations
    async fn committed_seats(&self, session_id: i64) -> Result<i32, AppError>;
}

/// Reservation lifecycle storage
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Capacity check and insert as one atomic unit.
    ///
    /// Fails with `CapacityExceeded` without inserting anything when the
    /// session cannot take `participants_count` more seats.
    async fn admit_reservation(&self, draft: &ReservationDraft) -> Result<Reservation, AppError>;

    async fn find_reservation(&self, id: i64) -> Result<Option<Reservation>, AppError>;

    /// All reservations, newest first, optionally of one session only
    async fn list_reservations(
        &self,
        session_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reservation>, AppError>;

    /// Reservations booked by a user, newest first
    async fn list_user_reservations(&self, user_id: i64) -> Result<Vec<Reservation>, AppError>;

    /// Non-cancelled reservations of a session
    async fn active_reservations(&self, session_id: i64) -> Result<Vec<Reservation>, AppError>;

    /// Latch `is_cancelled` on a reservation still in state `from`, and mark
    /// `refunded_payment` as refunded in the same transaction.
    ///
    /// Fails with `AlreadyCancelled` if another request won, and with
    /// `Conflict` if the reservation left `from` meanwhile (a pending one got
    /// paid), so a paid reservation is never cancelled without its refund.
    async fn cancel_reservation(
        &self,
        id: i64,
        from: ReservationState,
        refunded_payment: Option<i64>,
    ) -> Result<Reservation, AppError>;

    /// Pending reservations booked before `cutoff`
    async fn stale_unpaid_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, AppError>;
}

/// Weekly session templates
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create_schedule(
        &self,
        excursion_id: i64,
        draft: &ScheduleDraft,
    ) -> Result<RecurringSchedule, AppError>;

    async fn find_schedule(&self, id: i64) -> Result<Option<RecurringSchedule>, AppError>;

    /// Schedules by id, optionally of one excursion only
    async fn list_schedules(
        &self,
        excursion_id: Option<i64>,
    ) -> Result<Vec<RecurringSchedule>, AppError>;

    /// Remove a schedule; sessions it already published stay. Returns false
    /// when it did not exist.
    async fn delete_schedule(&self, id: i64) -> Result<bool, AppError>;

    /// Publish sessions at the planned subset of `candidates` and advance the
    /// repeat counter, as one unit under the schedule's lock.
    ///
    /// Returns the sessions created. A schedule or excursion that no longer
    /// exists yields `ScheduleNotFound`.
    async fn materialize_schedule(
        &self,
        schedule_id: i64,
        candidates: &[DateTime<Utc>],
    ) -> Result<Vec<Session>, AppError>;
}

/// Local mirror of gateway payments
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, AppError>;

    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, AppError>;

    async fn find_payment_by_reservation(
        &self,
        reservation_id: i64,
    ) -> Result<Option<Payment>, AppError>;

    /// Compare-and-set the status. Returns false when the current status was
    /// not `from`.
    async fn update_payment_status(
        &self,
        id: i64,
        from: crate::models::PaymentStatus,
        to: crate::models::PaymentStatus,
    ) -> Result<bool, AppError>;

    /// Record a captured payment: the payment becomes succeeded and its
    /// reservation paid, in one transaction. A cancelled reservation stays
    /// cancelled and is reported back so the caller can refund.
    async fn record_payment_success(&self, payment_id: i64) -> Result<ConfirmOutcome, AppError>;
}

/// Atomic persistence of a compensation run
#[async_trait]
pub trait CompensationRepository: Send + Sync {
    /// Cancel the collected reservations, mark refunded payments, delete the
    /// sessions and, when requested, the excursion with its photo rows.
    ///
    /// Fails with `Conflict` and changes nothing if a session gained an active
    /// reservation that is not part of the commit. Returns the photo paths
    /// removed.
    async fn commit_compensation(&self, commit: &CompensationCommit)
        -> Result<Vec<String>, AppError>;
}

/// Everything the booking services need from storage
pub trait BookingStore:
    ExcursionRepository
    + SessionRepository
    + ScheduleRepository
    + ReservationRepository
    + PaymentRepository
    + CompensationRepository
{
}

impl<T> BookingStore for T where
    T: ExcursionRepository
        + SessionRepository
        + ScheduleRepository
        + ReservationRepository
        + PaymentRepository
        + CompensationRepository
{
}

/// External payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge and return the gateway id and redirect reference
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult, AppError>;

    /// Return captured funds
    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, AppError>;
}

/// File attached to an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Plain text email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip)]
    pub attachments: Vec<Attachment>,
}

/// Outbound notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Set value in cache with TTL
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// Storage for excursion photo files
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Remove a stored photo. Missing files are not an error.
    async fn remove(&self, photo_url: &str) -> Result<(), AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}
