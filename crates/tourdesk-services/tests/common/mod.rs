//! Shared fixtures for the service flow tests
//!
//! Services run against the in-memory store; the gateway is a mockall mock
//! and outbound mail is recorded instead of sent.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tourdesk_core::{
    models::{
        Actor, ChargeRequest, ChargeResult, Contact, Excursion, NewExcursion, NewPayment, Payment,
        PaymentStatus, RefundRequest, RefundResult, Reservation, ReservationDraft, Session,
        SessionDraft, UserRole,
    },
    traits::{
        EmailMessage, ExcursionRepository, NotificationSink, PaymentGateway, PaymentRepository,
        PhotoStorage, ReservationRepository, SessionRepository,
    },
    AppError,
};
use tourdesk_db::MemoryBookingStore;
use tourdesk_services::{BookingServices, ServiceDeps};

pub const OWNER_ID: i64 = 10;
pub const GUEST_ID: i64 = 20;
pub const ADMIN_ID: i64 = 1;

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult, AppError>;
        async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, AppError>;
    }
}

/// A gateway that is never expected to be called
pub fn idle_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_charge().never();
    gateway.expect_refund().never();
    gateway
}

pub fn refund_ok(request: &RefundRequest) -> Result<RefundResult, AppError> {
    Ok(RefundResult {
        refund_id: format!("refund-{}", request.gateway_payment_id),
        status: "succeeded".to_string(),
    })
}

/// Gateway that answers after `delay`, for timeout checks
pub struct SlowGateway {
    pub delay: std::time::Duration,
}

#[async_trait]
impl PaymentGateway for SlowGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<ChargeResult, AppError> {
        tokio::time::sleep(self.delay).await;
        Ok(ChargeResult {
            gateway_payment_id: "pay-slow".to_string(),
            status: PaymentStatus::Created,
            confirmation_url: None,
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, AppError> {
        tokio::time::sleep(self.delay).await;
        refund_ok(request)
    }
}

/// Notification sink that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Notification("smtp unavailable".to_string()));
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

/// Photo storage that records removals
#[derive(Default)]
pub struct RecordingPhotos {
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl PhotoStorage for RecordingPhotos {
    async fn remove(&self, photo_url: &str) -> Result<(), AppError> {
        self.removed.lock().push(photo_url.to_string());
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<MemoryBookingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub photos: Arc<RecordingPhotos>,
    pub services: BookingServices,
}

pub fn fixture(gateway: impl PaymentGateway + 'static) -> Fixture {
    fixture_with(gateway, RecordingNotifier::default(), std::time::Duration::from_secs(5))
}

pub fn fixture_with(
    gateway: impl PaymentGateway + 'static,
    notifier: RecordingNotifier,
    gateway_timeout: std::time::Duration,
) -> Fixture {
    let store = Arc::new(MemoryBookingStore::new());
    let notifier = Arc::new(notifier);
    let photos = Arc::new(RecordingPhotos::default());

    let services = BookingServices::new(ServiceDeps {
        store: store.clone(),
        gateway: Arc::new(gateway),
        notifier: notifier.clone(),
        photos: photos.clone(),
        cache: None,
        currency: "RUB".to_string(),
        gateway_timeout,
        webhook_ttl_secs: 60,
        schedule_horizon_days: 28,
        tz: chrono_tz::Europe::Moscow,
    });

    Fixture {
        store,
        notifier,
        photos,
        services,
    }
}

pub fn owner() -> Actor {
    Actor::new(OWNER_ID, "owner@example.com", UserRole::Resident)
}

pub fn guest() -> Actor {
    Actor::new(GUEST_ID, "guest@example.com", UserRole::User)
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, "admin@example.com", UserRole::Admin)
}

pub fn contact(name: &str, email: &str) -> Contact {
    Contact {
        full_name: name.to_string(),
        phone_number: "+79001234567".to_string(),
        email: email.to_string(),
    }
}

impl Fixture {
    /// Excursion owned by `owner()` without sessions
    pub async fn excursion(&self) -> Excursion {
        self.store
            .create_excursion(
                OWNER_ID,
                &NewExcursion {
                    title: "Old town walk".to_string(),
                    description: "Two hours through the historic centre".to_string(),
                    place: "Central square".to_string(),
                    contact_email: None,
                    photo_urls: vec!["walks/cover.jpg".to_string()],
                },
            )
            .await
            .unwrap()
    }

    /// Excursion owned by `owner()` with one session a week from now
    pub async fn session(&self, capacity: i32, cost: Decimal) -> Session {
        let excursion = self.excursion().await;
        self.add_session(excursion.id, capacity, cost).await
    }

    pub async fn add_session(&self, excursion_id: i64, capacity: i32, cost: Decimal) -> Session {
        self.store
            .create_session(
                excursion_id,
                &SessionDraft {
                    start_at: Utc::now() + Duration::days(7),
                    max_participants: capacity,
                    cost,
                },
            )
            .await
            .unwrap()
    }

    /// Reservation that went through a captured payment
    pub async fn paid_reservation(
        &self,
        session: &Session,
        user_id: i64,
        name: &str,
        email: &str,
        seats: i32,
    ) -> (Reservation, Payment) {
        let reservation = self
            .store
            .admit_reservation(&ReservationDraft {
                session_id: session.id,
                user_id,
                contact: contact(name, email),
                participants_count: seats,
                is_paid: false,
            })
            .await
            .unwrap();
        let payment = self
            .store
            .insert_payment(&NewPayment {
                reservation_id: reservation.id,
                gateway_payment_id: format!("pay-{}", reservation.id),
                amount: session.total_cost(seats).unwrap(),
                currency: "RUB".to_string(),
                status: PaymentStatus::Created,
            })
            .await
            .unwrap();
        self.store.record_payment_success(payment.id).await.unwrap();

        let reservation = self
            .store
            .find_reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        let payment = self
            .store
            .find_payment_by_reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        (reservation, payment)
    }

    /// Reservation admitted without any payment
    pub async fn free_reservation(
        &self,
        session: &Session,
        user_id: i64,
        name: &str,
        email: &str,
        seats: i32,
    ) -> Reservation {
        self.store
            .admit_reservation(&ReservationDraft {
                session_id: session.id,
                user_id,
                contact: contact(name, email),
                participants_count: seats,
                is_paid: true,
            })
            .await
            .unwrap()
    }
}
