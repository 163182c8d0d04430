//! Administrator handlers

use crate::dto::{
    ApiResponse, PaginationParams, PurgeParams, PurgeResponse, ReservationDetailsResponse,
    ReservationFilterParams, ReservationResponse,
};
use actix_web::{web, HttpResponse};
use chrono::Duration;
use tourdesk_auth::AdminUser;
use tourdesk_core::config::BookingConfig;
use tourdesk_core::AppError;
use tourdesk_services::BookingServices;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Every reservation, newest first
///
/// GET /api/v1/admin/reservations
#[instrument(skip(services, admin))]
pub async fn list_reservations(
    services: web::Data<BookingServices>,
    admin: AdminUser,
    query: web::Query<PaginationParams>,
    filters: web::Query<ReservationFilterParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let reservations: Vec<ReservationResponse> = services
        .reservations
        .admin_list(&admin, filters.session_id, &query.to_pagination())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(reservations)))
}

/// One reservation with its session, excursion and payment
///
/// GET /api/v1/admin/reservations/{id}
#[instrument(skip(services, admin))]
pub async fn get_reservation(
    services: web::Data<BookingServices>,
    admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let details = services
        .reservations
        .admin_details(&admin, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReservationDetailsResponse::from(details))))
}

/// Force-cancel any reservation, refunding it first if paid
///
/// DELETE /api/v1/admin/reservations/{id}
#[instrument(skip(services, admin))]
pub async fn cancel_reservation(
    services: web::Data<BookingServices>,
    admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let reservation = services
        .reservations
        .admin_cancel(&admin, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        ReservationResponse::from(reservation),
        "Reservation cancelled by administrator",
    )))
}

/// Release seats held by reservations that were never paid
///
/// POST /api/v1/admin/housekeeping/purge-unpaid
#[instrument(skip(services, booking, admin))]
pub async fn purge_unpaid(
    services: web::Data<BookingServices>,
    booking: web::Data<BookingConfig>,
    admin: AdminUser,
    query: web::Query<PurgeParams>,
) -> Result<HttpResponse, AppError> {
    let window = match query.older_than_minutes {
        Some(minutes) => Duration::try_minutes(minutes).ok_or_else(|| {
            AppError::Validation(format!("older_than_minutes {} is out of range", minutes))
        })?,
        None => booking.stale_window()?,
    };

    let purged = services.reservations.purge_stale_unpaid(window).await?;
    info!(
        "Admin {} purged {} unpaid reservations",
        admin.user_id,
        purged.len()
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(PurgeResponse::from(purged))))
}

/// Publish upcoming sessions of every recurring schedule now
///
/// POST /api/v1/admin/housekeeping/publish-schedules
#[instrument(skip(services, admin))]
pub async fn publish_schedules(
    services: web::Data<BookingServices>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let run = services
        .schedules
        .publish_upcoming(services.schedules.today())
        .await?;
    info!(
        "Admin {} published {} scheduled sessions",
        admin.user_id,
        run.published.len()
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(run)))
}

/// Configure admin routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/reservations", web::get().to(list_reservations))
            .route("/reservations/{id}", web::get().to(get_reservation))
            .route("/reservations/{id}", web::delete().to(cancel_reservation))
            .route("/housekeeping/purge-unpaid", web::post().to(purge_unpaid))
            .route("/housekeeping/publish-schedules", web::post().to(publish_schedules)),
    );
}
