//! Reservation manager service
//!
//! Drives single reservations through their lifecycle:
//! - Admit a booking against the session's capacity and start its payment
//! - Cancel on behalf of the booking owner or an administrator, refunding first
//! - Purge pending reservations that were never paid
//! - Administrator views over every reservation

use crate::notifications::{self, deliver};
use crate::payment_adapter::PaymentAdapter;
use crate::session_context;
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tourdesk_core::{
    models::{
        format_local, Actor, ChargeMetadata, ChargeRequest, Contact, Excursion, NewPayment,
        Payment, PaymentStatus, Reservation, ReservationDraft, Session,
    },
    traits::{BookingStore, NotificationSink, Pagination},
    AppError, AppResult,
};
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// Result of a booking request
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub reservation: Reservation,
    /// Where the payer confirms the charge; absent for free sessions
    pub payment_url: Option<String>,
    pub gateway_payment_id: Option<String>,
}

impl BookingReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.reservation.is_paid
    }
}

/// A reservation with everything an administrator looks up next
#[derive(Debug, Clone, Serialize)]
pub struct ReservationDetails {
    pub reservation: Reservation,
    pub session: Session,
    pub excursion: Excursion,
    pub payment: Option<Payment>,
}

pub struct ReservationManager {
    store: Arc<dyn BookingStore>,
    payments: Arc<PaymentAdapter>,
    notifier: Arc<dyn NotificationSink>,
    currency: String,
    tz: Tz,
}

impl ReservationManager {
    pub fn new(
        store: Arc<dyn BookingStore>,
        payments: Arc<PaymentAdapter>,
        notifier: Arc<dyn NotificationSink>,
        currency: String,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            currency,
            tz,
        }
    }

    /// Book seats in a session
    ///
    /// Free sessions are confirmed at once. For paid sessions the reservation
    /// is stored as pending, then a charge is created and its redirect
    /// returned. If the charge fails the reservation stays pending with no
    /// payment row and the stale purge releases its seats later.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad contact or fewer than one participant
    /// - `SessionNotFound` / `ExcursionNotFound`
    /// - `CapacityExceeded` when the seats are not available; nothing is stored
    /// - `PaymentGateway` when the charge could not be created
    #[instrument(skip(self, actor, contact), fields(user_id = actor.user_id))]
    pub async fn create_reservation(
        &self,
        actor: &Actor,
        session_id: i64,
        contact: Contact,
        participants_count: i32,
    ) -> AppResult<BookingReceipt> {
        contact.validate()?;
        if participants_count < 1 {
            return Err(AppError::Validation(
                "participants_count must be at least 1".to_string(),
            ));
        }

        let (session, excursion) = session_context(self.store.as_ref(), session_id).await?;
        if !excursion.is_active {
            return Err(AppError::Validation(format!(
                "excursion {} is not open for booking",
                excursion.id
            )));
        }
        if session.start_at <= Utc::now() {
            return Err(AppError::Validation(format!(
                "session {} has already started",
                session.id
            )));
        }

        let free = session.is_free();
        let amount = session.total_cost(participants_count).ok_or_else(|| {
            AppError::Validation(format!(
                "{} participants exceed the largest payable amount",
                participants_count
            ))
        })?;

        let reservation = self
            .store
            .admit_reservation(&ReservationDraft {
                session_id,
                user_id: actor.user_id,
                contact,
                participants_count,
                is_paid: free,
            })
            .await?;

        if free {
            info!(
                "Free reservation {} confirmed for session {}",
                reservation.id, session_id
            );
            let message =
                notifications::booking_confirmation(&reservation, &session, &excursion, self.tz);
            deliver(self.notifier.as_ref(), message).await;
            return Ok(BookingReceipt {
                reservation,
                payment_url: None,
                gateway_payment_id: None,
            });
        }

        let request = ChargeRequest {
            amount,
            currency: self.currency.clone(),
            payer_email: actor.email.clone(),
            description: format!(
                "Excursion \"{}\" on {}",
                excursion.title,
                format_local(session.start_at, self.tz)
            ),
            quantity: participants_count,
            unit_price: session.cost,
            metadata: ChargeMetadata {
                reservation_id: reservation.id,
                session_id,
                email: actor.email.clone(),
            },
        };

        let charge = self.payments.charge(&request).await.map_err(|e| {
            warn!(
                error = %e,
                "Charge failed, reservation {} stays pending without payment",
                reservation.id
            );
            e
        })?;

        if charge.status != PaymentStatus::Created {
            debug!(
                "Gateway reported {} at creation, waiting for its event",
                charge.status
            );
        }

        self.store
            .insert_payment(&NewPayment {
                reservation_id: reservation.id,
                gateway_payment_id: charge.gateway_payment_id.clone(),
                amount,
                currency: self.currency.clone(),
                // Only gateway events move the status
                status: PaymentStatus::Created,
            })
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    "Charge {} created but not stored for reservation {}",
                    charge.gateway_payment_id, reservation.id
                );
                e
            })?;

        info!(
            "Reservation {} awaiting payment {} ({} {})",
            reservation.id, charge.gateway_payment_id, amount, self.currency
        );

        Ok(BookingReceipt {
            reservation,
            payment_url: charge.confirmation_url,
            gateway_payment_id: Some(charge.gateway_payment_id),
        })
    }

    /// Reservations of the calling user, newest first
    pub async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<Reservation>> {
        self.store.list_user_reservations(actor.user_id).await
    }

    /// Cancel a reservation on behalf of its owner
    ///
    /// Someone else's reservation is reported as not found.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn cancel_reservation(&self, actor: &Actor, reservation_id: i64) -> AppResult<Reservation> {
        let reservation = self
            .store
            .find_reservation(reservation_id)
            .await?
            .filter(|r| r.user_id == actor.user_id)
            .ok_or(AppError::ReservationNotFound(reservation_id))?;

        let (cancelled, refunded) = self.cancel_with_refund(reservation).await?;

        match session_context(self.store.as_ref(), cancelled.session_id).await {
            Ok((session, excursion)) => {
                let message = notifications::owner_cancellation(
                    &cancelled,
                    &session,
                    &excursion,
                    refunded.as_ref(),
                    self.tz,
                );
                deliver(self.notifier.as_ref(), message).await;
            }
            Err(e) => warn!(error = %e, "No cancellation email for {}", cancelled.id),
        }

        Ok(cancelled)
    }

    /// Every reservation, newest first, optionally of one session
    pub async fn admin_list(
        &self,
        actor: &Actor,
        session_id: Option<i64>,
        page: &Pagination,
    ) -> AppResult<Vec<Reservation>> {
        require_admin(actor)?;
        self.store
            .list_reservations(session_id, page.limit(), page.offset())
            .await
    }

    /// One reservation with its session, excursion and payment
    #[instrument(skip(self, actor), fields(admin_id = actor.user_id))]
    pub async fn admin_details(&self, actor: &Actor, reservation_id: i64) -> AppResult<ReservationDetails> {
        require_admin(actor)?;
        let reservation = self
            .store
            .find_reservation(reservation_id)
            .await?
            .ok_or(AppError::ReservationNotFound(reservation_id))?;
        let (session, excursion) = session_context(self.store.as_ref(), reservation.session_id).await?;
        let payment = self.store.find_payment_by_reservation(reservation_id).await?;

        Ok(ReservationDetails {
            reservation,
            session,
            excursion,
            payment,
        })
    }

    /// Administrator cancellation of any single reservation
    #[instrument(skip(self, actor), fields(admin_id = actor.user_id))]
    pub async fn admin_cancel(&self, actor: &Actor, reservation_id: i64) -> AppResult<Reservation> {
        require_admin(actor)?;

        let reservation = self
            .store
            .find_reservation(reservation_id)
            .await?
            .ok_or(AppError::ReservationNotFound(reservation_id))?;

        let (cancelled, refunded) = self.cancel_with_refund(reservation).await?;
        info!(
            "Admin {} cancelled reservation {}",
            actor.user_id, cancelled.id
        );

        match session_context(self.store.as_ref(), cancelled.session_id).await {
            Ok((session, excursion)) => {
                let message = notifications::admin_cancellation(
                    &cancelled,
                    &session,
                    &excursion,
                    refunded.is_some(),
                    self.tz,
                );
                deliver(self.notifier.as_ref(), message).await;
            }
            Err(e) => warn!(error = %e, "No cancellation email for {}", cancelled.id),
        }

        Ok(cancelled)
    }

    /// Refund if needed, then latch the cancellation
    ///
    /// A failed refund leaves the reservation exactly as it was.
    async fn cancel_with_refund(
        &self,
        reservation: Reservation,
    ) -> AppResult<(Reservation, Option<Payment>)> {
        let from = reservation.state();
        from.cancel(reservation.id)?;

        let refundable = self.payments.refundable_payment(&reservation).await?;
        if let Some(payment) = &refundable {
            self.payments.refund(payment).await.map_err(|e| {
                warn!(
                    error = %e,
                    "Refund failed, reservation {} left untouched",
                    reservation.id
                );
                e
            })?;
        }

        let cancelled = self
            .store
            .cancel_reservation(reservation.id, from, refundable.as_ref().map(|p| p.id))
            .await?;

        let refunded = refundable.map(|p| Payment {
            status: PaymentStatus::Refunded,
            ..p
        });
        Ok((cancelled, refunded))
    }

    /// Cancel pending reservations booked more than `older_than` ago
    ///
    /// No refund step: these were never paid. Reservations that got paid or
    /// cancelled while the sweep ran are skipped. Returns the ids cancelled.
    #[instrument(skip(self))]
    pub async fn purge_stale_unpaid(&self, older_than: Duration) -> AppResult<Vec<i64>> {
        if older_than < Duration::zero() {
            return Err(AppError::Validation(
                "staleness window cannot be negative".to_string(),
            ));
        }

        let cutoff = Utc::now().checked_sub_signed(older_than).ok_or_else(|| {
            AppError::Validation(format!(
                "staleness window of {} minutes is too large",
                older_than.num_minutes()
            ))
        })?;
        let stale = self.store.stale_unpaid_reservations(cutoff).await?;
        let mut purged = Vec::with_capacity(stale.len());

        for reservation in stale {
            match self
                .store
                .cancel_reservation(reservation.id, reservation.state(), None)
                .await
            {
                Ok(_) => purged.push(reservation.id),
                Err(AppError::AlreadyCancelled(_)) | Err(AppError::Conflict(_)) => {
                    debug!("Reservation {} changed during purge, skipped", reservation.id)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to purge reservation {}", reservation.id);
                }
            }
        }

        if !purged.is_empty() {
            info!(
                "Purged {} unpaid reservations booked before {}",
                purged.len(),
                cutoff
            );
        }
        Ok(purged)
    }
}

fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".to_string()))
    }
}
