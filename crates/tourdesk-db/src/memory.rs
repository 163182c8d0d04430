//! In-process booking store
//!
//! Keeps every table in one `parking_lot::Mutex`. Each trait method takes the
//! lock once and never awaits while holding it, so every operation is atomic
//! exactly like its PostgreSQL counterpart. Used by tests and by local runs
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use tourdesk_core::{
    models::{
        CompensationCommit, ConfirmOutcome, ConfirmStep, Excursion, ExcursionPhoto, NewExcursion,
        NewPayment, Payment, PaymentStatus, RecurringSchedule, Reservation, ReservationDraft,
        ReservationState, ScheduleDraft, Session, SessionAvailability, SessionDraft,
    },
    traits::{
        CompensationRepository, ExcursionRepository, PaymentRepository, ReservationRepository,
        ScheduleRepository, SessionRepository,
    },
    AppError, AppResult,
};
use tracing::{debug, info, warn};

#[derive(Default)]
struct State {
    next_id: i64,
    excursions: BTreeMap<i64, Excursion>,
    photos: BTreeMap<i64, ExcursionPhoto>,
    sessions: BTreeMap<i64, Session>,
    schedules: BTreeMap<i64, RecurringSchedule>,
    reservations: BTreeMap<i64, Reservation>,
    payments: BTreeMap<i64, Payment>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn committed(&self, session_id: i64) -> i32 {
        self.reservations
            .values()
            .filter(|r| r.session_id == session_id && r.is_active())
            .map(|r| r.participants_count)
            .sum()
    }

    /// Drop a session with its reservations and their payments
    fn delete_session(&mut self, session_id: i64) {
        self.sessions.remove(&session_id);
        let gone: HashSet<i64> = self
            .reservations
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.id)
            .collect();
        self.reservations.retain(|id, _| !gone.contains(id));
        self.payments.retain(|_, p| !gone.contains(&p.reservation_id));
    }
}

/// Booking store held entirely in memory
#[derive(Default)]
pub struct MemoryBookingStore {
    state: Mutex<State>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a reservation's booking time, for exercising the stale purge
    pub fn set_booked_at(&self, reservation_id: i64, booked_at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock();
        let reservation = state
            .reservations
            .get_mut(&reservation_id)
            .ok_or(AppError::ReservationNotFound(reservation_id))?;
        reservation.booked_at = booked_at;
        Ok(())
    }

    /// Every stored payment, for inspection
    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().payments.values().cloned().collect()
    }

    /// Number of stored reservations of a session, cancelled ones included
    pub fn reservation_count(&self, session_id: i64) -> usize {
        self.state
            .lock()
            .reservations
            .values()
            .filter(|r| r.session_id == session_id)
            .count()
    }
}

#[async_trait]
impl ExcursionRepository for MemoryBookingStore {
    async fn create_excursion(&self, owner_id: i64, input: &NewExcursion) -> AppResult<Excursion> {
        let mut state = self.state.lock();
        let id = state.next_id();
        let excursion = Excursion {
            id,
            title: input.title.clone(),
            description: input.description.clone(),
            place: input.place.clone(),
            contact_email: input.contact_email.clone(),
            owner_id,
            is_active: true,
            created_at: Utc::now(),
        };
        state.excursions.insert(id, excursion.clone());

        for (index, url) in input.photo_urls.iter().enumerate() {
            let photo_id = state.next_id();
            state.photos.insert(
                photo_id,
                ExcursionPhoto {
                    id: photo_id,
                    excursion_id: id,
                    photo_url: url.clone(),
                    order_index: index as i32,
                },
            );
        }

        info!("Created excursion {} for owner {}", id, owner_id);
        Ok(excursion)
    }

    async fn find_excursion(&self, id: i64) -> AppResult<Option<Excursion>> {
        Ok(self.state.lock().excursions.get(&id).cloned())
    }

    async fn list_excursions(
        &self,
        owner_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Excursion>> {
        let state = self.state.lock();
        Ok(state
            .excursions
            .values()
            .rev()
            .filter(|e| owner_id.map_or(true, |owner| e.owner_id == owner))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_photos(&self, excursion_id: i64) -> AppResult<Vec<ExcursionPhoto>> {
        let state = self.state.lock();
        let mut photos: Vec<ExcursionPhoto> = state
            .photos
            .values()
            .filter(|p| p.excursion_id == excursion_id)
            .cloned()
            .collect();
        photos.sort_by_key(|p| (p.order_index, p.id));
        Ok(photos)
    }
}

#[async_trait]
impl SessionRepository for MemoryBookingStore {
    async fn create_session(&self, excursion_id: i64, draft: &SessionDraft) -> AppResult<Session> {
        let mut state = self.state.lock();
        if !state.excursions.contains_key(&excursion_id) {
            return Err(AppError::ExcursionNotFound(excursion_id));
        }

        let id = state.next_id();
        let session = Session {
            id,
            excursion_id,
            start_at: draft.start_at,
            max_participants: draft.max_participants,
            cost: draft.cost,
        };
        state.sessions.insert(id, session.clone());

        info!("Created session {} for excursion {}", id, excursion_id);
        Ok(session)
    }

    async fn find_session(&self, id: i64) -> AppResult<Option<Session>> {
        Ok(self.state.lock().sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, excursion_id: i64) -> AppResult<Vec<SessionAvailability>> {
        let state = self.state.lock();
        let mut sessions: Vec<SessionAvailability> = state
            .sessions
            .values()
            .filter(|s| s.excursion_id == excursion_id)
            .map(|s| SessionAvailability::new(s.clone(), state.committed(s.id)))
            .collect();
        sessions.sort_by_key(|v| (v.session.start_at, v.session.id));
        Ok(sessions)
    }

    async fn update_session(&self, id: i64, draft: &SessionDraft) -> AppResult<Session> {
        let mut state = self.state.lock();
        let committed = state.committed(id);
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(AppError::SessionNotFound(id))?;

        session
            .ledger(committed)
            .can_resize_to(draft.max_participants)?;

        session.start_at = draft.start_at;
        session.max_participants = draft.max_participants;
        session.cost = draft.cost;

        info!("Updated session {}", id);
        Ok(session.clone())
    }

    async fn committed_seats(&self, session_id: i64) -> AppResult<i32> {
        Ok(self.state.lock().committed(session_id))
    }
}

#[async_trait]
impl ScheduleRepository for MemoryBookingStore {
    async fn create_schedule(
        &self,
        excursion_id: i64,
        draft: &ScheduleDraft,
    ) -> AppResult<RecurringSchedule> {
        let mut state = self.state.lock();
        if !state.excursions.contains_key(&excursion_id) {
            return Err(AppError::ExcursionNotFound(excursion_id));
        }

        let id = state.next_id();
        let schedule = RecurringSchedule {
            id,
            excursion_id,
            weekday: draft.weekday,
            start_time: draft.start_time,
            max_participants: draft.max_participants,
            cost: draft.cost,
            repeats: draft.repeats,
            count_of_repeats: 0,
        };
        state.schedules.insert(id, schedule.clone());

        info!("Created schedule {} for excursion {}", id, excursion_id);
        Ok(schedule)
    }

    async fn find_schedule(&self, id: i64) -> AppResult<Option<RecurringSchedule>> {
        Ok(self.state.lock().schedules.get(&id).cloned())
    }

    async fn list_schedules(&self, excursion_id: Option<i64>) -> AppResult<Vec<RecurringSchedule>> {
        let state = self.state.lock();
        Ok(state
            .schedules
            .values()
            .filter(|s| excursion_id.map_or(true, |e| s.excursion_id == e))
            .cloned()
            .collect())
    }

    async fn delete_schedule(&self, id: i64) -> AppResult<bool> {
        Ok(self.state.lock().schedules.remove(&id).is_some())
    }

    async fn materialize_schedule(
        &self,
        schedule_id: i64,
        candidates: &[DateTime<Utc>],
    ) -> AppResult<Vec<Session>> {
        let mut state = self.state.lock();
        let schedule = state
            .schedules
            .get(&schedule_id)
            .cloned()
            .ok_or(AppError::ScheduleNotFound(schedule_id))?;

        let existing: HashSet<DateTime<Utc>> = state
            .sessions
            .values()
            .filter(|s| s.excursion_id == schedule.excursion_id)
            .map(|s| s.start_at)
            .collect();

        let mut created = Vec::new();
        for start_at in schedule.plan(candidates, &existing) {
            let id = state.next_id();
            let draft = schedule.session_draft(start_at);
            let session = Session {
                id,
                excursion_id: schedule.excursion_id,
                start_at: draft.start_at,
                max_participants: draft.max_participants,
                cost: draft.cost,
            };
            state.sessions.insert(id, session.clone());
            created.push(session);
        }

        if let Some(stored) = state.schedules.get_mut(&schedule_id) {
            stored.count_of_repeats += created.len() as i32;
        }

        debug!(
            "Schedule {} published {} sessions",
            schedule_id,
            created.len()
        );
        Ok(created)
    }
}

#[async_trait]
impl ReservationRepository for MemoryBookingStore {
    async fn admit_reservation(&self, draft: &ReservationDraft) -> AppResult<Reservation> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get(&draft.session_id)
            .cloned()
            .ok_or(AppError::SessionNotFound(draft.session_id))?;

        let committed = state.committed(session.id);
        if let Err(e) = session.ledger(committed).admit(draft.participants_count) {
            warn!(
                "Rejecting booking for session {}: {} requested, {}/{} committed",
                session.id, draft.participants_count, committed, session.max_participants
            );
            return Err(e);
        }

        let id = state.next_id();
        let reservation = Reservation {
            id,
            session_id: draft.session_id,
            user_id: draft.user_id,
            contact: draft.contact.clone(),
            participants_count: draft.participants_count,
            is_paid: draft.is_paid,
            is_cancelled: false,
            booked_at: Utc::now(),
        };
        state.reservations.insert(id, reservation.clone());

        debug!("Admitted reservation {} for session {}", id, session.id);
        Ok(reservation)
    }

    async fn find_reservation(&self, id: i64) -> AppResult<Option<Reservation>> {
        Ok(self.state.lock().reservations.get(&id).cloned())
    }

    async fn list_reservations(
        &self,
        session_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock();
        Ok(state
            .reservations
            .values()
            .rev()
            .filter(|r| session_id.map_or(true, |s| r.session_id == s))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_user_reservations(&self, user_id: i64) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock();
        Ok(state
            .reservations
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_reservations(&self, session_id: i64) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock();
        Ok(state
            .reservations
            .values()
            .filter(|r| r.session_id == session_id && r.is_active())
            .cloned()
            .collect())
    }

    async fn cancel_reservation(
        &self,
        id: i64,
        from: ReservationState,
        refunded_payment: Option<i64>,
    ) -> AppResult<Reservation> {
        from.cancel(id)?;
        let mut state = self.state.lock();
        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(AppError::ReservationNotFound(id))?;

        let current = reservation.state();
        current.cancel(id)?;
        if current != from {
            warn!("Reservation {} left state {:?} before cancellation", id, from);
            return Err(AppError::Conflict(format!(
                "reservation {} changed state, retry",
                id
            )));
        }
        reservation.is_cancelled = true;
        let cancelled = reservation.clone();

        if let Some(payment_id) = refunded_payment {
            if let Some(payment) = state.payments.get_mut(&payment_id) {
                if payment.reservation_id == id && payment.status == PaymentStatus::Succeeded {
                    payment.status = PaymentStatus::Refunded;
                    payment.updated_at = Utc::now();
                }
            }
        }

        info!("Cancelled reservation {}", id);
        Ok(cancelled)
    }

    async fn stale_unpaid_reservations(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock();
        Ok(state
            .reservations
            .values()
            .filter(|r| r.is_stale(cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MemoryBookingStore {
    async fn insert_payment(&self, payment: &NewPayment) -> AppResult<Payment> {
        let mut state = self.state.lock();
        if state
            .payments
            .values()
            .any(|p| p.reservation_id == payment.reservation_id)
        {
            return Err(AppError::Conflict(format!(
                "reservation {} already has a payment",
                payment.reservation_id
            )));
        }

        let id = state.next_id();
        let now = Utc::now();
        let stored = Payment {
            id,
            reservation_id: payment.reservation_id,
            gateway_payment_id: payment.gateway_payment_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status,
            created_at: now,
            updated_at: now,
        };
        state.payments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_payment_by_gateway_id(&self, gateway_payment_id: &str) -> AppResult<Option<Payment>> {
        let state = self.state.lock();
        Ok(state
            .payments
            .values()
            .find(|p| p.gateway_payment_id == gateway_payment_id)
            .cloned())
    }

    async fn find_payment_by_reservation(&self, reservation_id: i64) -> AppResult<Option<Payment>> {
        let state = self.state.lock();
        Ok(state
            .payments
            .values()
            .find(|p| p.reservation_id == reservation_id)
            .cloned())
    }

    async fn update_payment_status(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.payments.get_mut(&id) {
            Some(payment) if payment.status == from => {
                payment.status = to;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_payment_success(&self, payment_id: i64) -> AppResult<ConfirmOutcome> {
        let mut state = self.state.lock();
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| AppError::NotFound(format!("payment {}", payment_id)))?;
        if payment.status == PaymentStatus::Created {
            payment.status = PaymentStatus::Succeeded;
            payment.updated_at = Utc::now();
        }
        let reservation_id = payment.reservation_id;

        let reservation = state
            .reservations
            .get_mut(&reservation_id)
            .ok_or(AppError::ReservationNotFound(reservation_id))?;

        Ok(match reservation.state().confirm(reservation_id) {
            Ok(ConfirmStep::Apply) => {
                reservation.is_paid = true;
                ConfirmOutcome::Confirmed(reservation.clone())
            }
            Ok(ConfirmStep::NoOp) => ConfirmOutcome::AlreadyPaid(reservation.clone()),
            Err(_) => ConfirmOutcome::ReservationCancelled(reservation.clone()),
        })
    }
}

#[async_trait]
impl CompensationRepository for MemoryBookingStore {
    async fn commit_compensation(&self, commit: &CompensationCommit) -> AppResult<Vec<String>> {
        let mut state = self.state.lock();

        if let Some(excursion_id) = commit.excursion_id {
            if !state.excursions.contains_key(&excursion_id) {
                return Err(AppError::ExcursionNotFound(excursion_id));
            }
            let planned: HashSet<i64> = commit.session_ids.iter().copied().collect();
            if let Some(extra) = state
                .sessions
                .values()
                .find(|s| s.excursion_id == excursion_id && !planned.contains(&s.id))
            {
                return Err(AppError::Conflict(format!(
                    "excursion {} gained session {} while being deleted, retry",
                    excursion_id, extra.id
                )));
            }
        }

        if let Some(missing) = commit
            .session_ids
            .iter()
            .find(|id| !state.sessions.contains_key(*id))
        {
            return Err(AppError::Conflict(format!(
                "session {} disappeared during compensation",
                missing
            )));
        }

        let sessions: HashSet<i64> = commit.session_ids.iter().copied().collect();
        let planned: HashSet<i64> = commit.cancelled_reservation_ids.iter().copied().collect();
        if let Some(unplanned) = state
            .reservations
            .values()
            .find(|r| sessions.contains(&r.session_id) && r.is_active() && !planned.contains(&r.id))
        {
            return Err(AppError::Conflict(format!(
                "reservation {} was booked while its session was being deleted, retry",
                unplanned.id
            )));
        }

        // Validation done, nothing below can fail
        for id in &commit.cancelled_reservation_ids {
            if let Some(r) = state.reservations.get_mut(id) {
                r.is_cancelled = true;
            }
        }
        for id in &commit.refunded_payment_ids {
            if let Some(p) = state.payments.get_mut(id) {
                if p.status == PaymentStatus::Succeeded {
                    p.status = PaymentStatus::Refunded;
                    p.updated_at = Utc::now();
                }
            }
        }
        for id in &commit.session_ids {
            state.delete_session(*id);
        }

        let mut removed_photos = Vec::new();
        if let Some(excursion_id) = commit.excursion_id {
            let photo_ids: Vec<i64> = state
                .photos
                .values()
                .filter(|p| p.excursion_id == excursion_id)
                .map(|p| p.id)
                .collect();
            for id in photo_ids {
                if let Some(photo) = state.photos.remove(&id) {
                    removed_photos.push(photo.photo_url);
                }
            }
            state.schedules.retain(|_, s| s.excursion_id != excursion_id);
            state.excursions.remove(&excursion_id);
        }

        info!(
            "Committed compensation: {} sessions deleted, {} reservations cancelled",
            commit.session_ids.len(),
            commit.cancelled_reservation_ids.len()
        );
        Ok(removed_photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tourdesk_core::models::Contact;

    fn contact(name: &str) -> Contact {
        Contact {
            full_name: name.to_string(),
            phone_number: "+79000000000".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn draft(session_id: i64, seats: i32, is_paid: bool) -> ReservationDraft {
        ReservationDraft {
            session_id,
            user_id: 100,
            contact: contact("Guest"),
            participants_count: seats,
            is_paid,
        }
    }

    async fn seeded(capacity: i32) -> (MemoryBookingStore, Session) {
        let store = MemoryBookingStore::new();
        let excursion = store
            .create_excursion(
                1,
                &NewExcursion {
                    title: "Harbour tour".to_string(),
                    description: "Boats and cranes".to_string(),
                    place: "Pier 3".to_string(),
                    contact_email: None,
                    photo_urls: vec!["harbour/1.jpg".to_string()],
                },
            )
            .await
            .unwrap();
        let session = store
            .create_session(
                excursion.id,
                &SessionDraft {
                    start_at: Utc::now() + Duration::days(3),
                    max_participants: capacity,
                    cost: dec!(500),
                },
            )
            .await
            .unwrap();
        (store, session)
    }

    #[tokio::test]
    async fn test_admission_counts_pending_and_paid() {
        let (store, session) = seeded(5).await;
        store.admit_reservation(&draft(session.id, 2, false)).await.unwrap();
        store.admit_reservation(&draft(session.id, 2, true)).await.unwrap();

        let err = store
            .admit_reservation(&draft(session.id, 2, false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { available: 1, .. }));
        assert_eq!(store.reservation_count(session.id), 2);
        assert_eq!(store.committed_seats(session.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_cancel_is_one_way() {
        let (store, session) = seeded(5).await;
        let r = store.admit_reservation(&draft(session.id, 1, false)).await.unwrap();

        assert!(matches!(
            store.cancel_reservation(r.id, ReservationState::Paid, None).await,
            Err(AppError::Conflict(_))
        ));

        let cancelled = store
            .cancel_reservation(r.id, ReservationState::Pending, None)
            .await
            .unwrap();
        assert!(cancelled.is_cancelled);
        assert!(matches!(
            store.cancel_reservation(r.id, ReservationState::Pending, None).await,
            Err(AppError::AlreadyCancelled(_))
        ));
        assert!(matches!(
            store.cancel_reservation(9999, ReservationState::Pending, None).await,
            Err(AppError::ReservationNotFound(9999))
        ));
        assert_eq!(store.committed_seats(session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_payment_success_outcomes() {
        let (store, session) = seeded(5).await;
        let r = store.admit_reservation(&draft(session.id, 1, false)).await.unwrap();
        let payment = store
            .insert_payment(&NewPayment {
                reservation_id: r.id,
                gateway_payment_id: "pay-1".to_string(),
                amount: dec!(500),
                currency: "RUB".to_string(),
                status: PaymentStatus::Created,
            })
            .await
            .unwrap();

        assert!(matches!(
            store.record_payment_success(payment.id).await.unwrap(),
            ConfirmOutcome::Confirmed(_)
        ));
        assert!(matches!(
            store.record_payment_success(payment.id).await.unwrap(),
            ConfirmOutcome::AlreadyPaid(_)
        ));

        let stored = store.find_payment_by_gateway_id("pay-1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_update_session_cannot_strand_seats() {
        let (store, session) = seeded(5).await;
        store.admit_reservation(&draft(session.id, 4, true)).await.unwrap();

        let shrink = SessionDraft {
            start_at: session.start_at,
            max_participants: 3,
            cost: session.cost,
        };
        assert!(matches!(
            store.update_session(session.id, &shrink).await,
            Err(AppError::Validation(_))
        ));

        let grow = SessionDraft {
            max_participants: 8,
            ..shrink
        };
        assert_eq!(
            store.update_session(session.id, &grow).await.unwrap().max_participants,
            8
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_unplanned_reservation() {
        let (store, session) = seeded(5).await;
        let planned = store.admit_reservation(&draft(session.id, 1, true)).await.unwrap();
        store.admit_reservation(&draft(session.id, 1, true)).await.unwrap();

        let commit = CompensationCommit {
            excursion_id: None,
            session_ids: vec![session.id],
            cancelled_reservation_ids: vec![planned.id],
            refunded_payment_ids: vec![],
        };
        assert!(matches!(
            store.commit_compensation(&commit).await,
            Err(AppError::Conflict(_))
        ));
        // Unchanged
        assert!(store.find_session(session.id).await.unwrap().is_some());
        assert_eq!(store.active_reservations(session.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_excursion_returns_photos() {
        let (store, session) = seeded(5).await;
        let commit = CompensationCommit {
            excursion_id: Some(session.excursion_id),
            session_ids: vec![session.id],
            cancelled_reservation_ids: vec![],
            refunded_payment_ids: vec![],
        };

        let photos = store.commit_compensation(&commit).await.unwrap();
        assert_eq!(photos, vec!["harbour/1.jpg".to_string()]);
        assert!(store.find_excursion(session.excursion_id).await.unwrap().is_none());
        assert!(store.find_session(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_unpaid() {
        let (store, session) = seeded(5).await;
        let old = store.admit_reservation(&draft(session.id, 1, false)).await.unwrap();
        store.admit_reservation(&draft(session.id, 1, false)).await.unwrap();
        let paid = store.admit_reservation(&draft(session.id, 1, true)).await.unwrap();
        store.set_booked_at(old.id, Utc::now() - Duration::minutes(30)).unwrap();
        store.set_booked_at(paid.id, Utc::now() - Duration::minutes(30)).unwrap();

        let stale = store
            .stale_unpaid_reservations(Utc::now() - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn test_materialize_schedule_is_idempotent() {
        let (store, session) = seeded(5).await;
        let schedule = store
            .create_schedule(
                session.excursion_id,
                &ScheduleDraft {
                    weekday: 1,
                    start_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    max_participants: 12,
                    cost: dec!(800),
                    repeats: 3,
                },
            )
            .await
            .unwrap();

        let first = Utc::now() + Duration::days(7);
        let candidates = vec![
            session.start_at,
            first,
            first + Duration::days(7),
            first + Duration::days(14),
        ];

        // The seeded session already sits at the first candidate
        let created = store
            .materialize_schedule(schedule.id, &candidates)
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|s| s.max_participants == 12 && s.cost == dec!(800)));

        let again = store
            .materialize_schedule(schedule.id, &candidates)
            .await
            .unwrap();
        assert!(again.is_empty());

        let stored = store.find_schedule(schedule.id).await.unwrap().unwrap();
        assert_eq!(stored.count_of_repeats, 3);
        assert!(stored.is_exhausted());
        assert_eq!(store.list_sessions(session.excursion_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_excursion_commit_drops_schedules() {
        let (store, session) = seeded(5).await;
        let schedule = store
            .create_schedule(
                session.excursion_id,
                &ScheduleDraft {
                    weekday: 6,
                    start_time: chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                    max_participants: 5,
                    cost: dec!(0),
                    repeats: 0,
                },
            )
            .await
            .unwrap();

        store
            .commit_compensation(&CompensationCommit {
                excursion_id: Some(session.excursion_id),
                session_ids: vec![session.id],
                cancelled_reservation_ids: vec![],
                refunded_payment_ids: vec![],
            })
            .await
            .unwrap();

        assert!(store.list_schedules(None).await.unwrap().is_empty());
        assert!(matches!(
            store.materialize_schedule(schedule.id, &[Utc::now()]).await,
            Err(AppError::ScheduleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_reservations_newest_first() {
        let (store, session) = seeded(5).await;
        let first = store.admit_reservation(&draft(session.id, 1, false)).await.unwrap();
        let second = store.admit_reservation(&draft(session.id, 1, true)).await.unwrap();

        let all = store.list_reservations(None, 10, 0).await.unwrap();
        assert_eq!(
            all.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(store.list_reservations(Some(session.id), 1, 1).await.unwrap()[0].id, first.id);
        assert!(store.list_reservations(Some(9999), 10, 0).await.unwrap().is_empty());
    }
}
