//! Excursion model
//!
//! An excursion is the catalogue entry an organizer publishes. It owns its
//! sessions and photos; removing it goes through the compensation flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Excursion entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Excursion {
    /// Unique identifier
    pub id: i64,

    /// Display title
    pub title: String,

    /// Long description
    pub description: String,

    /// Meeting point / venue
    pub place: String,

    /// Organizer contact shown in confirmation emails
    pub contact_email: Option<String>,

    /// Organizer (resident) who owns the excursion
    pub owner_id: i64,

    /// Whether the excursion is listed
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Photo attached to an excursion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcursionPhoto {
    pub id: i64,
    pub excursion_id: i64,
    /// Path relative to the photo storage root
    pub photo_url: String,
    pub order_index: i32,
}

/// Input for publishing an excursion
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExcursion {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[validate(length(min = 1, max = 255))]
    pub place: String,

    #[validate(email)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub photo_urls: Vec<String>,
}
