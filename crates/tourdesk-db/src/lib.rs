//! Tourdesk Database Layer
//!
//! This crate provides storage for the Tourdesk booking core. It includes:
//!
//! - Connection pool management and embedded migrations with sqlx
//! - `PgBookingStore`, the PostgreSQL implementation of every repository trait
//! - `MemoryBookingStore`, an in-process store with the same atomicity rules
//!
//! Admission and session updates lock the session row (`SELECT ... FOR UPDATE`)
//! so concurrent bookings for one session serialize around the capacity check.

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::MemoryBookingStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::PgBookingStore;

// Re-export commonly used types
pub use sqlx::{PgPool, Postgres, Transaction};
pub use tourdesk_core::{AppError, AppResult};
