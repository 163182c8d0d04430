//! Excursion and session inventory
//!
//! Deleting either goes through the compensation orchestrator, never here.

use crate::managed_excursion;
use serde::Serialize;
use std::sync::Arc;
use tourdesk_core::{
    models::{Actor, Excursion, ExcursionPhoto, NewExcursion, Session, SessionAvailability, SessionDraft},
    traits::{BookingStore, Pagination},
    AppError, AppResult,
};
use tracing::{info, instrument};
use validator::Validate;

/// Excursion page: photos and sessions with their seat accounting
#[derive(Debug, Clone, Serialize)]
pub struct ExcursionDetails {
    #[serde(flatten)]
    pub excursion: Excursion,
    pub photos: Vec<ExcursionPhoto>,
    pub sessions: Vec<SessionAvailability>,
}

pub struct CatalogService {
    store: Arc<dyn BookingStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, actor, input), fields(owner_id = actor.user_id))]
    pub async fn create_excursion(&self, actor: &Actor, input: NewExcursion) -> AppResult<Excursion> {
        if !actor.role.can_publish() {
            return Err(AppError::Forbidden(
                "only residents and admins publish excursions".to_string(),
            ));
        }
        input.validate()?;

        let excursion = self.store.create_excursion(actor.user_id, &input).await?;
        info!("User {} published excursion {}", actor.user_id, excursion.id);
        Ok(excursion)
    }

    pub async fn list_excursions(
        &self,
        owner_id: Option<i64>,
        page: &Pagination,
    ) -> AppResult<Vec<Excursion>> {
        self.store
            .list_excursions(owner_id, page.limit(), page.offset())
            .await
    }

    pub async fn excursion_details(&self, excursion_id: i64) -> AppResult<ExcursionDetails> {
        let excursion = self
            .store
            .find_excursion(excursion_id)
            .await?
            .ok_or(AppError::ExcursionNotFound(excursion_id))?;
        let photos = self.store.list_photos(excursion_id).await?;
        let sessions = self.store.list_sessions(excursion_id).await?;

        Ok(ExcursionDetails {
            excursion,
            photos,
            sessions,
        })
    }

    #[instrument(skip(self, actor, draft), fields(actor_id = actor.user_id))]
    pub async fn create_session(
        &self,
        actor: &Actor,
        excursion_id: i64,
        draft: SessionDraft,
    ) -> AppResult<Session> {
        managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        let session = self.store.create_session(excursion_id, &draft).await?;
        info!(
            "Session {} added to excursion {} ({} seats at {})",
            session.id, excursion_id, session.max_participants, session.cost
        );
        Ok(session)
    }

    /// Reschedule or resize a session. Capacity can't drop below committed seats.
    #[instrument(skip(self, actor, draft), fields(actor_id = actor.user_id))]
    pub async fn update_session(
        &self,
        actor: &Actor,
        excursion_id: i64,
        session_id: i64,
        draft: SessionDraft,
    ) -> AppResult<Session> {
        managed_excursion(self.store.as_ref(), actor, excursion_id).await?;
        self.store
            .find_session(session_id)
            .await?
            .filter(|s| s.excursion_id == excursion_id)
            .ok_or(AppError::SessionNotFound(session_id))?;

        self.store.update_session(session_id, &draft).await
    }
}
