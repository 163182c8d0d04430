//! Compensation Orchestrator
//!
//! Deleting a session or an excursion runs as one unit:
//!
//! 1. collect the active reservations of every session in scope
//! 2. refund the paid ones, one at a time; the first failure aborts the run
//!    with the store untouched
//! 3. cancel every collected reservation and build the ledger
//! 4. persist cancellations, refunds and deletions in one transaction
//! 5. mail the ledger to the actor and a notice to each participant
//!
//! Mail and photo cleanup happen after the commit and only log failures.

use crate::managed_excursion;
use crate::notifications::{self, deliver};
use crate::payment_adapter::PaymentAdapter;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use tourdesk_core::{
    models::{
        Actor, CompensationCommit, CompensationLedger, CompensationPhase, CompensationReport,
        CompensationScope, Excursion, LedgerRow, Payment, Reservation, Session,
    },
    traits::{BookingStore, EmailMessage, NotificationSink, PhotoStorage},
    AppError, AppResult,
};
use tracing::{debug, error, info, instrument, warn};

/// One collected reservation with the payment that must be returned
struct Affected {
    session: Session,
    reservation: Reservation,
    refundable: Option<Payment>,
}

/// Phase bookkeeping for a single run
struct Run {
    scope: CompensationScope,
    phase: CompensationPhase,
}

impl Run {
    fn new(scope: CompensationScope) -> Self {
        Self {
            scope,
            phase: CompensationPhase::Collecting,
        }
    }

    fn advance(&mut self, next: CompensationPhase) -> AppResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(AppError::Internal(format!(
                "compensation of {} cannot go from {} to {}",
                self.scope, self.phase, next
            )));
        }
        debug!("Compensation of {}: {} -> {}", self.scope, self.phase, next);
        self.phase = next;
        Ok(())
    }
}

pub struct CompensationOrchestrator {
    store: Arc<dyn BookingStore>,
    payments: Arc<PaymentAdapter>,
    notifier: Arc<dyn NotificationSink>,
    photos: Arc<dyn PhotoStorage>,
    tz: Tz,
}

impl CompensationOrchestrator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        payments: Arc<PaymentAdapter>,
        notifier: Arc<dyn NotificationSink>,
        photos: Arc<dyn PhotoStorage>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            photos,
            tz,
        }
    }

    /// Delete one session of `excursion_id`, compensating its reservations
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete_session(
        &self,
        actor: &Actor,
        excursion_id: i64,
        session_id: i64,
    ) -> AppResult<CompensationReport> {
        let excursion = managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|s| s.excursion_id == excursion_id)
            .ok_or(AppError::SessionNotFound(session_id))?;

        self.run(actor, CompensationScope::Session(session_id), excursion, vec![session])
            .await
    }

    /// Delete an excursion with all its sessions and photos
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete_excursion(
        &self,
        actor: &Actor,
        excursion_id: i64,
    ) -> AppResult<CompensationReport> {
        let excursion = managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        let sessions = self
            .store
            .list_sessions(excursion_id)
            .await?
            .into_iter()
            .map(|availability| availability.session)
            .collect();

        self.run(actor, CompensationScope::Excursion(excursion_id), excursion, sessions)
            .await
    }

    async fn run(
        &self,
        actor: &Actor,
        scope: CompensationScope,
        excursion: Excursion,
        sessions: Vec<Session>,
    ) -> AppResult<CompensationReport> {
        let mut run = Run::new(scope);
        info!(
            "Compensating {} ({} sessions) for user {}",
            scope,
            sessions.len(),
            actor.user_id
        );

        // Collecting
        let affected = match self.collect(&sessions).await {
            Ok(affected) => affected,
            Err(e) => {
                run.advance(CompensationPhase::Aborted)?;
                return Err(e);
            }
        };

        // Refunding, strictly one after another
        run.advance(CompensationPhase::Refunding)?;
        let mut refunded_payments = Vec::new();
        for item in &affected {
            let Some(payment) = &item.refundable else {
                continue;
            };
            if let Err(e) = self.payments.refund(payment).await {
                run.advance(CompensationPhase::Aborted)?;
                error!(
                    error = %e,
                    "Compensation of {} aborted at reservation {} after {} refunds",
                    scope,
                    item.reservation.id,
                    refunded_payments.len()
                );
                return Err(AppError::CompensationAborted {
                    reservation_id: item.reservation.id,
                    reason: e.to_string(),
                });
            }
            refunded_payments.push(payment.id);
        }

        // Cancelling: ledger rows and notices, nothing persisted yet
        run.advance(CompensationPhase::Cancelling)?;
        let refunded_reservations: HashSet<i64> = affected
            .iter()
            .filter(|a| a.refundable.is_some())
            .map(|a| a.reservation.id)
            .collect();
        let mut ledger = CompensationLedger::new();
        let mut notices: Vec<EmailMessage> = Vec::with_capacity(affected.len());
        for item in &affected {
            let state = item.reservation.state().cancel(item.reservation.id)?;
            debug!("Reservation {} -> {:?}", item.reservation.id, state);

            ledger.push(LedgerRow::cancelled(&item.reservation, &item.session, &excursion));
            notices.push(notifications::session_cancelled(
                &item.reservation,
                &item.session,
                &excursion,
                refunded_reservations.contains(&item.reservation.id),
                self.tz,
            ));
        }

        // Persisting
        run.advance(CompensationPhase::Persisting)?;
        let deleted_sessions: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        let commit = CompensationCommit {
            excursion_id: match scope {
                CompensationScope::Excursion(id) => Some(id),
                CompensationScope::Session(_) => None,
            },
            session_ids: deleted_sessions.clone(),
            cancelled_reservation_ids: affected.iter().map(|a| a.reservation.id).collect(),
            refunded_payment_ids: refunded_payments.clone(),
        };
        let removed_photos = self.store.commit_compensation(&commit).await.map_err(|e| {
            error!(
                error = %e,
                "Compensation of {} not persisted after {} refunds; retry is safe",
                scope,
                refunded_payments.len()
            );
            e
        })?;

        for photo in &removed_photos {
            if let Err(e) = self.photos.remove(photo).await {
                warn!(error = %e, "Failed to remove photo file {}", photo);
            }
        }

        let export_csv = ledger.to_csv(self.tz);

        if ledger.is_empty() {
            run.advance(CompensationPhase::Done)?;
        } else {
            run.advance(CompensationPhase::Notifying)?;
            let summary = notifications::deletion_summary(
                &actor.email,
                scope,
                &excursion,
                &ledger,
                export_csv.clone(),
            );
            deliver(self.notifier.as_ref(), summary).await;
            for notice in notices {
                deliver(self.notifier.as_ref(), notice).await;
            }
            run.advance(CompensationPhase::Done)?;
        }

        info!(
            "Compensated {}: {} sessions deleted, {} reservations cancelled, {} refunds",
            scope,
            deleted_sessions.len(),
            ledger.len(),
            refunded_payments.len()
        );

        Ok(CompensationReport {
            scope,
            phase: run.phase,
            deleted_sessions,
            refunded_payments,
            ledger,
            export_csv: Some(export_csv),
            removed_photos,
        })
    }

    async fn collect(&self, sessions: &[Session]) -> AppResult<Vec<Affected>> {
        let mut affected = Vec::new();
        for session in sessions {
            for reservation in self.store.active_reservations(session.id).await? {
                let refundable = self.payments.refundable_payment(&reservation).await?;
                affected.push(Affected {
                    session: session.clone(),
                    reservation,
                    refundable,
                });
            }
        }
        Ok(affected)
    }
}
