//! HTTP request handlers

pub mod admin;
pub mod catalog;
pub mod health;
pub mod reservation;
pub mod webhook;

pub use admin::configure as configure_admin;
pub use catalog::configure as configure_catalog;
pub use health::health_check;
pub use reservation::configure as configure_reservations;
pub use webhook::configure as configure_webhooks;
