//! Row structs for mapping query results into domain models

use super::seats;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tourdesk_core::models::{
    Contact, Excursion, ExcursionPhoto, Payment, PaymentStatus, RecurringSchedule, Reservation,
    Session, SessionAvailability,
};
use tracing::warn;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExcursionRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub place: String,
    pub contact_email: Option<String>,
    pub owner_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ExcursionRow> for Excursion {
    fn from(row: ExcursionRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            place: row.place,
            contact_email: row.contact_email,
            owner_id: row.owner_id,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PhotoRow {
    pub id: i64,
    pub excursion_id: i64,
    pub photo_url: String,
    pub order_index: i32,
}

impl From<PhotoRow> for ExcursionPhoto {
    fn from(row: PhotoRow) -> Self {
        Self {
            id: row.id,
            excursion_id: row.excursion_id,
            photo_url: row.photo_url,
            order_index: row.order_index,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub id: i64,
    pub excursion_id: i64,
    pub start_at: DateTime<Utc>,
    pub max_participants: i32,
    pub cost: Decimal,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            excursion_id: row.excursion_id,
            start_at: row.start_at,
            max_participants: row.max_participants,
            cost: row.cost,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionAvailabilityRow {
    pub id: i64,
    pub excursion_id: i64,
    pub start_at: DateTime<Utc>,
    pub max_participants: i32,
    pub cost: Decimal,
    pub booked: i64,
}

impl From<SessionAvailabilityRow> for SessionAvailability {
    fn from(row: SessionAvailabilityRow) -> Self {
        let session = Session {
            id: row.id,
            excursion_id: row.excursion_id,
            start_at: row.start_at,
            max_participants: row.max_participants,
            cost: row.cost,
        };
        SessionAvailability::new(session, seats(row.booked))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ScheduleRow {
    pub id: i64,
    pub excursion_id: i64,
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub max_participants: i32,
    pub cost: Decimal,
    pub repeats: i32,
    pub count_of_repeats: i32,
}

impl From<ScheduleRow> for RecurringSchedule {
    fn from(row: ScheduleRow) -> Self {
        Self {
            id: row.id,
            excursion_id: row.excursion_id,
            weekday: row.weekday,
            start_time: row.start_time,
            max_participants: row.max_participants,
            cost: row.cost,
            repeats: row.repeats,
            count_of_repeats: row.count_of_repeats,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReservationRow {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub participants_count: i32,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub booked_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            contact: Contact {
                full_name: row.full_name,
                phone_number: row.phone_number,
                email: row.email,
            },
            participants_count: row.participants_count,
            is_paid: row.is_paid,
            is_cancelled: row.is_cancelled,
            booked_at: row.booked_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    pub id: i64,
    pub reservation_id: i64,
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        let status = PaymentStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!(
                "Unknown payment status '{}' on payment {}, treating as created",
                row.status, row.id
            );
            PaymentStatus::Created
        });

        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            gateway_payment_id: row.gateway_payment_id,
            amount: row.amount,
            currency: row.currency,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
