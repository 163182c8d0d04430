//! Reservation DTOs
//!
//! Request and response types for booking, cancellation and housekeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourdesk_core::models::{Contact, Excursion, Payment, Reservation, ReservationState, Session};
use tourdesk_services::{BookingReceipt, ReservationDetails};
use validator::Validate;

/// Booking request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, max = 255, message = "Full name is required"))]
    pub full_name: String,

    #[validate(length(min = 3, max = 50, message = "Phone number is required"))]
    pub phone_number: String,

    #[validate(email(message = "Invalid email"))]
    pub email: String,

    #[validate(range(min = 1, message = "At least one participant"))]
    pub participants_count: i32,
}

impl CreateReservationRequest {
    pub fn contact(&self) -> Contact {
        Contact {
            full_name: self.full_name.clone(),
            phone_number: self.phone_number.clone(),
            email: self.email.clone(),
        }
    }
}

/// Reservation as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct ReservationResponse {
    pub id: i64,
    pub session_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub participants_count: i32,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub state: ReservationState,
    pub booked_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        let state = r.state();
        Self {
            id: r.id,
            session_id: r.session_id,
            full_name: r.contact.full_name,
            phone_number: r.contact.phone_number,
            email: r.contact.email,
            participants_count: r.participants_count,
            is_paid: r.is_paid,
            is_cancelled: r.is_cancelled,
            state,
            booked_at: r.booked_at,
        }
    }
}

/// Booking result; `payment_url` is where the payer confirms the charge
#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub reservation: ReservationResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

impl From<BookingReceipt> for BookingResponse {
    fn from(receipt: BookingReceipt) -> Self {
        Self {
            reservation: receipt.reservation.into(),
            payment_url: receipt.payment_url,
            payment_id: receipt.gateway_payment_id,
        }
    }
}

/// Administrator reservation detail
#[derive(Debug, Clone, Serialize)]
pub struct ReservationDetailsResponse {
    pub reservation: ReservationResponse,
    pub session: Session,
    pub excursion: Excursion,
    pub payment: Option<Payment>,
}

impl From<ReservationDetails> for ReservationDetailsResponse {
    fn from(details: ReservationDetails) -> Self {
        Self {
            reservation: details.reservation.into(),
            session: details.session,
            excursion: details.excursion,
            payment: details.payment,
        }
    }
}

/// `?session_id=` on the administrator reservation list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationFilterParams {
    pub session_id: Option<i64>,
}

/// Stale purge parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurgeParams {
    /// Defaults to the configured staleness window
    pub older_than_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    pub purged: Vec<i64>,
    pub count: usize,
}

impl From<Vec<i64>> for PurgeResponse {
    fn from(purged: Vec<i64>) -> Self {
        Self {
            count: purged.len(),
            purged,
        }
    }
}
