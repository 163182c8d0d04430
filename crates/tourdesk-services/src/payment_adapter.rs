//! Payment Adapter
//!
//! The only component that talks to the gateway. Every call is bounded by a
//! timeout, and webhook events are applied to the local payment found by its
//! gateway id. Statuses only move forward, so duplicate and out-of-order
//! deliveries fall out as no-ops.

use crate::notifications::{self, deliver};
use crate::session_context;
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tourdesk_cache::keys::{webhook_key, WEBHOOK_TTL_SECS};
use tourdesk_core::{
    models::{
        ChargeRequest, ChargeResult, ConfirmOutcome, GatewayEvent, Payment, PaymentStatus,
        RefundRequest, RefundResult, Reservation, StatusChange,
    },
    traits::{BookingStore, CacheService, NotificationSink, PaymentGateway},
    AppError, AppResult,
};
use tracing::{debug, error, info, instrument, warn};

/// What `on_event` did with a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Already applied earlier
    Duplicate,
    /// Unknown payment, unsupported event or a backwards move
    Ignored,
    /// Capture for a cancelled reservation, money sent back
    LateCaptureRefunded,
}

pub struct PaymentAdapter {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    cache: Option<Arc<dyn CacheService>>,
    call_timeout: Duration,
    webhook_ttl_secs: u64,
    tz: Tz,
}

impl PaymentAdapter {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        call_timeout: Duration,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            cache: None,
            call_timeout,
            webhook_ttl_secs: WEBHOOK_TTL_SECS,
            tz,
        }
    }

    /// Remember processed webhook deliveries for `ttl_secs`
    pub fn with_cache(mut self, cache: Arc<dyn CacheService>, ttl_secs: u64) -> Self {
        self.cache = Some(cache);
        self.webhook_ttl_secs = ttl_secs;
        self
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Gateway {} timed out after {:?}", what, self.call_timeout);
                Err(AppError::PaymentGateway(format!(
                    "{} timed out after {}s",
                    what,
                    self.call_timeout.as_secs()
                )))
            }
        }
    }

    /// Create a charge. Nothing is persisted here.
    #[instrument(skip(self, request), fields(reservation_id = request.metadata.reservation_id))]
    pub async fn charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult> {
        let result = self.bounded("charge", self.gateway.charge(request)).await?;
        debug!(
            "Charge {} created with status {}",
            result.gateway_payment_id, result.status
        );
        Ok(result)
    }

    /// Refund a captured payment in full
    ///
    /// Only a refund the gateway reports as succeeded counts; anything else
    /// is a `PaymentGateway` error and the caller must not cancel.
    #[instrument(skip(self, payment), fields(payment_id = payment.id, gateway_payment_id = %payment.gateway_payment_id))]
    pub async fn refund(&self, payment: &Payment) -> AppResult<RefundResult> {
        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::InvalidTransition(format!(
                "payment {} is {} and cannot be refunded",
                payment.id, payment.status
            )));
        }

        let request = RefundRequest {
            gateway_payment_id: payment.gateway_payment_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
        };
        let result = self.bounded("refund", self.gateway.refund(&request)).await?;

        if !result.is_succeeded() {
            warn!(
                "Refund {} for payment {} ended as {}",
                result.refund_id, payment.id, result.status
            );
            return Err(AppError::PaymentGateway(format!(
                "refund for payment {} is {}",
                payment.gateway_payment_id, result.status
            )));
        }

        info!("Refunded payment {} ({})", payment.id, payment.amount);
        Ok(result)
    }

    /// The payment that has to be refunded before `reservation` can be cancelled
    pub async fn refundable_payment(&self, reservation: &Reservation) -> AppResult<Option<Payment>> {
        if !reservation.is_paid {
            return Ok(None);
        }
        let payment = self.store.find_payment_by_reservation(reservation.id).await?;
        Ok(payment.filter(|p| p.status == PaymentStatus::Succeeded))
    }

    /// Apply a gateway event
    #[instrument(skip(self, event), fields(event = %event.name()))]
    pub async fn on_event(&self, event: GatewayEvent) -> AppResult<EventOutcome> {
        let (delivery, gateway_payment_id, target) = match (
            event.delivery_key(),
            event.gateway_payment_id(),
            event.target_status(),
        ) {
            (Some(delivery), Some(id), Some(target)) => (delivery, id.to_string(), target),
            _ => {
                info!("Ignoring unsupported gateway event {}", event.name());
                return Ok(EventOutcome::Ignored);
            }
        };

        if self.seen(&delivery).await {
            debug!("Delivery {} already processed", delivery);
            return Ok(EventOutcome::Duplicate);
        }

        let Some(payment) = self.store.find_payment_by_gateway_id(&gateway_payment_id).await? else {
            if let GatewayEvent::PaymentSucceeded {
                reservation_hint: Some(hint),
                ..
            } = &event
            {
                warn!(
                    "Unknown payment {} (reservation hint {}), ignoring",
                    gateway_payment_id, hint
                );
            } else {
                warn!("Unknown payment {}, ignoring", gateway_payment_id);
            }
            return Ok(EventOutcome::Ignored);
        };

        let outcome = match payment.status.change_to(target) {
            StatusChange::Reject => {
                warn!(
                    "Ignoring {} for payment {} in status {}",
                    event.name(),
                    payment.id,
                    payment.status
                );
                EventOutcome::Ignored
            }
            StatusChange::Duplicate if target == PaymentStatus::Succeeded => {
                // A late capture whose refund failed earlier is retried here
                self.settle_if_cancelled(&payment).await?
            }
            StatusChange::Duplicate => EventOutcome::Duplicate,
            StatusChange::Apply => self.apply(&payment, target).await?,
        };

        self.remember(&delivery).await;
        Ok(outcome)
    }

    async fn apply(&self, payment: &Payment, target: PaymentStatus) -> AppResult<EventOutcome> {
        match target {
            PaymentStatus::Succeeded => match self.store.record_payment_success(payment.id).await? {
                ConfirmOutcome::Confirmed(reservation) => {
                    info!("Reservation {} paid", reservation.id);
                    self.send_confirmation(&reservation).await;
                    Ok(EventOutcome::Applied)
                }
                ConfirmOutcome::AlreadyPaid(_) => Ok(EventOutcome::Applied),
                ConfirmOutcome::ReservationCancelled(reservation) => {
                    warn!(
                        "Payment {} captured for cancelled reservation {}",
                        payment.id, reservation.id
                    );
                    let captured = Payment {
                        status: PaymentStatus::Succeeded,
                        ..payment.clone()
                    };
                    self.refund_late_capture(&captured).await
                }
            },
            PaymentStatus::Canceled | PaymentStatus::Refunded => {
                if self
                    .store
                    .update_payment_status(payment.id, payment.status, target)
                    .await?
                {
                    info!("Payment {} is now {}", payment.id, target);
                    Ok(EventOutcome::Applied)
                } else {
                    // Someone else moved it first
                    Ok(EventOutcome::Duplicate)
                }
            }
            PaymentStatus::Created => Ok(EventOutcome::Ignored),
        }
    }

    async fn settle_if_cancelled(&self, payment: &Payment) -> AppResult<EventOutcome> {
        let cancelled = self
            .store
            .find_reservation(payment.reservation_id)
            .await?
            .map(|r| r.is_cancelled)
            .unwrap_or(false);

        if cancelled {
            self.refund_late_capture(payment).await
        } else {
            Ok(EventOutcome::Duplicate)
        }
    }

    async fn refund_late_capture(&self, payment: &Payment) -> AppResult<EventOutcome> {
        if let Err(e) = self.refund(payment).await {
            error!(
                error = %e,
                "Late capture {} could not be refunded, will retry on redelivery",
                payment.id
            );
            return Err(e);
        }
        self.store
            .update_payment_status(payment.id, PaymentStatus::Succeeded, PaymentStatus::Refunded)
            .await?;
        Ok(EventOutcome::LateCaptureRefunded)
    }

    async fn send_confirmation(&self, reservation: &Reservation) {
        match session_context(self.store.as_ref(), reservation.session_id).await {
            Ok((session, excursion)) => {
                let message =
                    notifications::booking_confirmation(reservation, &session, &excursion, self.tz);
                deliver(self.notifier.as_ref(), message).await;
            }
            Err(e) => warn!(error = %e, "No confirmation for reservation {}", reservation.id),
        }
    }

    async fn seen(&self, delivery: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.exists(&webhook_key(delivery)).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!(error = %e, "Webhook cache unavailable, falling back to store checks");
                false
            }
        }
    }

    async fn remember(&self, delivery: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .set(&webhook_key(delivery), "1", self.webhook_ttl_secs)
                .await
            {
                warn!(error = %e, "Failed to remember webhook delivery {}", delivery);
            }
        }
    }
}
