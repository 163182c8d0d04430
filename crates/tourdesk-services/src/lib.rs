//! Booking services for Tourdesk
//!
//! This crate holds the business flows on top of the store and gateway seams
//! defined in tourdesk-core:
//!
//! - `ReservationManager` - booking, owner and admin cancellation, stale purge
//! - `PaymentAdapter` - charges, refunds and gateway events
//! - `CompensationOrchestrator` - cascading deletion of sessions and excursions
//! - `CatalogService` - excursion and session inventory
//! - `ScheduleService` - weekly schedules and the sessions they publish
//!
//! Services hold their collaborators behind `Arc<dyn Trait>` so the same code
//! runs against PostgreSQL in production and the in-memory store in tests.

pub mod catalog;
pub mod compensation;
pub mod mailer;
pub mod notifications;
pub mod payment_adapter;
pub mod reservation_manager;
pub mod scheduler;
pub mod storage;

pub use catalog::{CatalogService, ExcursionDetails};
pub use compensation::CompensationOrchestrator;
pub use mailer::{LogNotifier, SmtpNotifier};
pub use payment_adapter::{EventOutcome, PaymentAdapter};
pub use reservation_manager::{BookingReceipt, ReservationDetails, ReservationManager};
pub use scheduler::{PublishedSchedule, ScheduleRun, ScheduleService};
pub use storage::LocalPhotoStore;

use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tourdesk_core::{
    models::{Actor, Excursion, Session},
    traits::{BookingStore, CacheService, NotificationSink, PaymentGateway, PhotoStorage},
    AppError, AppResult,
};

/// Session and its excursion, both required to exist
pub(crate) async fn session_context(
    store: &dyn BookingStore,
    session_id: i64,
) -> AppResult<(Session, Excursion)> {
    let session = store
        .find_session(session_id)
        .await?
        .ok_or(AppError::SessionNotFound(session_id))?;
    let excursion = store
        .find_excursion(session.excursion_id)
        .await?
        .ok_or(AppError::ExcursionNotFound(session.excursion_id))?;
    Ok((session, excursion))
}

/// Excursion that `actor` may change: its owner or an administrator
pub(crate) async fn managed_excursion(
    store: &dyn BookingStore,
    actor: &Actor,
    excursion_id: i64,
) -> AppResult<Excursion> {
    let excursion = store
        .find_excursion(excursion_id)
        .await?
        .ok_or(AppError::ExcursionNotFound(excursion_id))?;

    if !actor.can_manage_excursion(excursion.owner_id) {
        warn!(
            "User {} may not manage excursion {}",
            actor.user_id, excursion_id
        );
        return Err(AppError::Forbidden(format!(
            "excursion {} belongs to another organizer",
            excursion_id
        )));
    }
    Ok(excursion)
}

/// Everything the booking services need, wired once at startup
pub struct ServiceDeps {
    pub store: Arc<dyn BookingStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationSink>,
    pub photos: Arc<dyn PhotoStorage>,
    pub cache: Option<Arc<dyn CacheService>>,
    pub currency: String,
    pub gateway_timeout: Duration,
    pub webhook_ttl_secs: u64,
    pub schedule_horizon_days: u32,
    pub tz: Tz,
}

/// The service set shared by all HTTP workers
#[derive(Clone)]
pub struct BookingServices {
    pub catalog: Arc<CatalogService>,
    pub schedules: Arc<ScheduleService>,
    pub reservations: Arc<ReservationManager>,
    pub payments: Arc<PaymentAdapter>,
    pub compensation: Arc<CompensationOrchestrator>,
}

impl BookingServices {
    pub fn new(deps: ServiceDeps) -> Self {
        let mut adapter = PaymentAdapter::new(
            deps.store.clone(),
            deps.gateway,
            deps.notifier.clone(),
            deps.gateway_timeout,
            deps.tz,
        );
        if let Some(cache) = deps.cache {
            adapter = adapter.with_cache(cache, deps.webhook_ttl_secs);
        }
        let payments = Arc::new(adapter);

        Self {
            catalog: Arc::new(CatalogService::new(deps.store.clone())),
            schedules: Arc::new(ScheduleService::new(
                deps.store.clone(),
                deps.tz,
                deps.schedule_horizon_days,
            )),
            reservations: Arc::new(ReservationManager::new(
                deps.store.clone(),
                payments.clone(),
                deps.notifier.clone(),
                deps.currency,
                deps.tz,
            )),
            compensation: Arc::new(CompensationOrchestrator::new(
                deps.store,
                payments.clone(),
                deps.notifier,
                deps.photos,
                deps.tz,
            )),
            payments,
        }
    }
}
