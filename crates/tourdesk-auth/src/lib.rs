//! Authentication for Tourdesk
//!
//! Accounts are managed elsewhere; this crate only trusts signed tokens. A
//! valid token yields an [`Actor`](tourdesk_core::models::Actor) that the
//! handlers pass into the booking services.
//!
//! # Using extractors in Actix-web
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use tourdesk_auth::{AdminUser, AuthenticatedUser};
//!
//! async fn my_bookings(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "user_id": user.actor.user_id }))
//! }
//!
//! async fn purge(_admin: AdminUser) -> HttpResponse {
//!     HttpResponse::NoContent().finish()
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser, PublisherUser};
