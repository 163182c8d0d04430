//! Reservation handlers
//!
//! Booking and self-service cancellation for signed-in users.

use crate::dto::{ApiResponse, BookingResponse, CreateReservationRequest, ReservationResponse};
use actix_web::{web, HttpResponse};
use tourdesk_auth::AuthenticatedUser;
use tourdesk_core::AppError;
use tourdesk_services::BookingServices;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Book seats in a session
///
/// POST /api/v1/sessions/{session_id}/reservations
#[instrument(skip(services, user, req))]
pub async fn create_reservation(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    req: web::Json<CreateReservationRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Reservation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let session_id = path.into_inner();
    let receipt = services
        .reservations
        .create_reservation(&user, session_id, req.contact(), req.participants_count)
        .await?;

    info!(
        "User {} booked {} seats in session {} (reservation {})",
        user.user_id, req.participants_count, session_id, receipt.reservation.id
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(BookingResponse::from(receipt))))
}

/// Reservations of the caller
///
/// GET /api/v1/reservations/mine
#[instrument(skip(services, user))]
pub async fn list_my_reservations(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let reservations: Vec<ReservationResponse> = services
        .reservations
        .list_mine(&user)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(reservations)))
}

/// Cancel one of the caller's reservations, refunding it if paid
///
/// POST /api/v1/reservations/{id}/cancel
#[instrument(skip(services, user))]
pub async fn cancel_reservation(
    services: web::Data<BookingServices>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let reservation = services
        .reservations
        .cancel_reservation(&user, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        ReservationResponse::from(reservation),
        "Reservation cancelled",
    )))
}

/// Configure reservation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sessions")
            .route("/{session_id}/reservations", web::post().to(create_reservation)),
    )
    .service(
        web::scope("/reservations")
            .route("/mine", web::get().to(list_my_reservations))
            .route("/{id}/cancel", web::post().to(cancel_reservation)),
    );
}
