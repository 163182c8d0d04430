//! API layer for Tourdesk
//!
//! HTTP handlers for the excursion catalogue, bookings, deletions with their
//! cancellation exports, administrator tools and the payment gateway webhook.
//!
//! Handlers expect these in app data:
//! - `web::Data<BookingServices>`
//! - `web::Data<Arc<JwtService>>` for the auth extractors
//! - `web::Data<BookingConfig>` for the housekeeping defaults

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::{ApiResponse, PaginationParams};
pub use handlers::{
    configure_admin, configure_catalog, configure_reservations, configure_webhooks, health_check,
};

use actix_web::web;

/// Mount every route under `/api/v1`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            // Excursions and their sessions
            .configure(configure_catalog)
            // Booking and self-service cancellation
            .configure(configure_reservations)
            // Administrator tools
            .configure(configure_admin)
            // Gateway notifications
            .configure(configure_webhooks),
    );
}
