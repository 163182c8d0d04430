//! Tourdesk Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Tourdesk booking backend. It includes:
//!
//! - Domain models (Excursion, Session, Reservation, Payment, ledger rows)
//! - The capacity ledger and the reservation state machine
//! - Trait seams for storage, the payment gateway and notifications
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod capacity;
pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use capacity::CapacityLedger;
pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
