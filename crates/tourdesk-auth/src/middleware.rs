//! Request extractors with role checks
//!
//! The `JwtService` must be registered as `web::Data<Arc<JwtService>>`.

use crate::jwt::JwtService;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use std::sync::Arc;
use tourdesk_core::error::AppError;
use tourdesk_core::models::Actor;
use tracing::{debug, warn};

/// Bearer token from the Authorization header, else the `token` cookie
fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| req.cookie("token").map(|cookie| cookie.value().to_string()))
}

fn authenticate(req: &HttpRequest) -> Result<Actor, AppError> {
    let jwt_service = req
        .app_data::<web::Data<Arc<JwtService>>>()
        .ok_or_else(|| {
            warn!("JwtService not found in app data");
            AppError::Unauthorized("Authentication service not configured".to_string())
        })?;

    let token = bearer_token(req).ok_or_else(|| {
        debug!("No authentication token found in request");
        AppError::Unauthorized("No authentication token provided".to_string())
    })?;

    let actor = jwt_service.validate_token(&token)?.actor()?;
    debug!(user_id = actor.user_id, role = %actor.role, "User authenticated");
    Ok(actor)
}

/// Any signed-in user
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use tourdesk_auth::AuthenticatedUser;
///
/// async fn handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().body(user.actor.email.clone())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub actor: Actor,
}

impl AuthenticatedUser {
    pub fn into_actor(self) -> Actor {
        self.actor
    }
}

impl std::ops::Deref for AuthenticatedUser {
    type Target = Actor;

    fn deref(&self) -> &Self::Target {
        &self.actor
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            authenticate(req)
                .map(|actor| AuthenticatedUser { actor })
                .map_err(|e| {
                    warn!(error = %e, "Authentication failed");
                    e.into()
                }),
        )
    }
}

/// Authenticate, then require `allowed` to hold for the caller's role
fn authenticate_with_role(
    req: &HttpRequest,
    allowed: fn(&Actor) -> bool,
    requirement: &str,
) -> Result<AuthenticatedUser, actix_web::Error> {
    let actor = authenticate(req).map_err(|e| {
        warn!(error = %e, "Authentication failed");
        actix_web::Error::from(e)
    })?;

    if !allowed(&actor) {
        warn!(user_id = actor.user_id, role = %actor.role, "Denied: {}", requirement);
        return Err(AppError::Forbidden(requirement.to_string()).into());
    }
    Ok(AuthenticatedUser { actor })
}

/// Requires the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate_with_role(req, Actor::is_admin, "admin role required").map(AdminUser))
    }
}

/// Requires a role that may publish excursions (resident or admin)
#[derive(Debug, Clone)]
pub struct PublisherUser(pub AuthenticatedUser);

impl std::ops::Deref for PublisherUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for PublisherUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            authenticate_with_role(
                req,
                |actor| actor.role.can_publish(),
                "resident or admin role required",
            )
            .map(PublisherUser),
        )
    }
}
