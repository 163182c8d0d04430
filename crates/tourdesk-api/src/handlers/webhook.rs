//! Payment gateway webhook
//!
//! Any 2xx tells the gateway to stop redelivering. Processing failures
//! (a late-capture refund that could not be sent, a store outage) answer with
//! an error status so the delivery is retried.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tourdesk_core::AppError;
use tourdesk_gateway::parse_event;
use tourdesk_services::{BookingServices, EventOutcome};
use tracing::{debug, instrument, warn};

fn outcome_label(outcome: &EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Applied => "applied",
        EventOutcome::Duplicate => "duplicate",
        EventOutcome::Ignored => "ignored",
        EventOutcome::LateCaptureRefunded => "refunded",
    }
}

/// Receive a gateway notification
///
/// POST /api/v1/webhooks/payments
#[instrument(skip(services, body), fields(bytes = body.len()))]
pub async fn payment_webhook(
    services: web::Data<BookingServices>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let event = parse_event(&body).map_err(|e| {
        warn!("Rejected webhook body: {}", e);
        e
    })?;
    debug!("Webhook event {}", event.name());

    let outcome = services.payments.on_event(event).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": outcome_label(&outcome) })))
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").route("/payments", web::post().to(payment_webhook)));
}
