//! JWT claims
//!
//! `sub` carries the numeric user id as a string, the way most issuers
//! encode it. Email and role ride along so no account lookup is needed.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tourdesk_core::error::AppError;
use tourdesk_core::models::{Actor, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,

    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp), set by `JwtService` when zero
    pub exp: i64,
}

impl Claims {
    /// Claims for an actor, expiration left to the service
    ///
    /// # Examples
    ///
    /// ```
    /// use tourdesk_auth::Claims;
    /// use tourdesk_core::models::{Actor, UserRole};
    ///
    /// let claims = Claims::new(&Actor::new(7, "guide@example.com", UserRole::Resident));
    /// assert_eq!(claims.sub, "7");
    /// assert_eq!(claims.exp, 0);
    /// ```
    pub fn new(actor: &Actor) -> Self {
        Self {
            sub: actor.user_id.to_string(),
            email: actor.email.clone(),
            role: actor.role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    pub fn with_expiration(actor: &Actor, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
            ..Self::new(actor)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// Turn the claims into the identity the services act for
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidToken` if `sub` is not a user id
    pub fn actor(&self) -> Result<Actor, AppError> {
        let user_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::InvalidToken(format!("subject is not a user id: {}", self.sub)))?;
        Ok(Actor::new(user_id, self.email.clone(), self.role))
    }
}
