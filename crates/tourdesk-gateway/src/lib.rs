//! Payment gateway adapter for Tourdesk
//!
//! [`HttpPaymentGateway`] implements the core `PaymentGateway` trait against
//! a YooKassa-style REST API, and [`parse_event`] turns webhook deliveries into
//! typed `GatewayEvent`s.

pub mod client;
pub mod event;
pub mod types;

pub use client::HttpPaymentGateway;
pub use event::parse_event;
