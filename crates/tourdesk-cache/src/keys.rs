//! Cache key constants and builders for Tourdesk
//!
//! # Key Patterns
//!
//! - `webhook:{event}:{object_id}` - a gateway delivery that was already applied
//!
//! # Example
//!
//! ```
//! use tourdesk_cache::keys;
//!
//! let key = keys::webhook_key("payment.succeeded:2d3f-000f");
//! assert_eq!(key, "webhook:payment.succeeded:2d3f-000f");
//! ```

/// Prefix for processed webhook deliveries
///
/// Format: `webhook:{event}:{object_id}`
pub const WEBHOOK_PREFIX: &str = "webhook";

/// Default TTL for processed deliveries (24 hours)
pub const WEBHOOK_TTL_SECS: u64 = 86_400;

/// Build the key remembering one applied gateway delivery
///
/// `delivery` is the event's own `{event}:{object_id}` key.
pub fn webhook_key(delivery: &str) -> String {
    format!("{}:{}", WEBHOOK_PREFIX, delivery)
}
