//! Bearer token signing and verification

use crate::claims::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tourdesk_core::error::AppError;
use tourdesk_core::models::Actor;
use tracing::{debug, error, warn};

/// HS256 token service shared by every worker
///
/// Tokens are issued elsewhere in production; this side mostly verifies.
/// Signing is kept for tests and operator tooling.
#[derive(Clone)]
pub struct JwtService {
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// # Examples
    ///
    /// ```
    /// use tourdesk_auth::JwtService;
    ///
    /// let jwt_service = JwtService::new("my-secret-key", 3600);
    /// assert_eq!(jwt_service.expiration_secs(), 3600);
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token is dead the second it expires
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            lifetime: Duration::seconds(expiration_secs),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign claims. A zero `exp` gets the configured lifetime.
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut signed = claims.clone();
        if signed.exp == 0 {
            signed.exp = (Utc::now() + self.lifetime).timestamp();
        }

        encode(&Header::new(Algorithm::HS256), &signed, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign token for user {}", signed.sub);
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    pub fn create_token_for_actor(&self, actor: &Actor) -> Result<String, AppError> {
        self.create_token(&Claims::new(actor))
    }

    /// Verify signature and expiry, returning the claims
    ///
    /// # Errors
    ///
    /// - `AppError::TokenExpired` once `exp` has passed
    /// - `AppError::InvalidToken` for anything else wrong with the token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("Rejected expired token");
                    AppError::TokenExpired
                }
                _ => {
                    warn!(error = %e, "Rejected token");
                    AppError::InvalidToken(format!("Token validation failed: {}", e))
                }
            })?;

        debug!(user_id = %claims.sub, role = %claims.role, "Token accepted");
        Ok(claims)
    }

    pub fn expiration_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("lifetime_secs", &self.lifetime.num_seconds())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
