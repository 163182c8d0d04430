//! User roles and the acting identity
//!
//! Credential storage lives outside this system. Requests arrive with a token
//! whose claims are turned into an [`Actor`], which is passed explicitly into
//! every booking and compensation operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular customer who books seats
    #[default]
    User,
    /// Organizer who owns excursions
    Resident,
    /// Platform administrator
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Resident => write!(f, "resident"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl UserRole {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "resident" => Some(UserRole::Resident),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Residents and admins can publish excursions
    pub fn can_publish(&self) -> bool {
        matches!(self, UserRole::Resident | UserRole::Admin)
    }
}

/// The authenticated identity on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: i64, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins manage everything, residents only what they own
    pub fn can_manage_excursion(&self, owner_id: i64) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Resident => self.user_id == owner_id,
            UserRole::User => false,
        }
    }
}
