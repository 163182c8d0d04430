//! Webhook notifications from the gateway
//!
//! Deliveries look like `{"type": "notification", "event": "payment.succeeded",
//! "object": {...}}`. For payment events `object.id` is the payment; for
//! refunds it is the refund and `object.payment_id` names the payment.

use serde::Deserialize;
use serde_json::Value;
use tourdesk_core::error::AppError;
use tourdesk_core::models::GatewayEvent;

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub event: String,
    #[serde(default)]
    pub object: Value,
}

/// Decode a webhook body into a [`GatewayEvent`]
///
/// Unknown event names decode to `Unsupported` so they can be acknowledged.
///
/// # Errors
///
/// `AppError::InvalidInput` for malformed JSON or a known event whose object
/// lacks the ids it must carry.
pub fn parse_event(body: &[u8]) -> Result<GatewayEvent, AppError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("malformed webhook body: {}", e)))?;
    envelope.into_event()
}

impl WebhookEnvelope {
    pub fn into_event(self) -> Result<GatewayEvent, AppError> {
        let object = &self.object;
        match self.event.as_str() {
            "payment.succeeded" => Ok(GatewayEvent::PaymentSucceeded {
                gateway_payment_id: required_str(object, "id", &self.event)?,
                reservation_hint: reservation_hint(object),
            }),
            "payment.canceled" => Ok(GatewayEvent::PaymentCanceled {
                gateway_payment_id: required_str(object, "id", &self.event)?,
                reservation_hint: reservation_hint(object),
            }),
            "refund.succeeded" => Ok(GatewayEvent::RefundSucceeded {
                refund_id: required_str(object, "id", &self.event)?,
                gateway_payment_id: required_str(object, "payment_id", &self.event)?,
            }),
            _ => Ok(GatewayEvent::Unsupported { event: self.event }),
        }
    }
}

fn required_str(object: &Value, field: &str, event: &str) -> Result<String, AppError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput(format!("{} without object.{}", event, field)))
}

/// `metadata.reservation_id` comes back as a string even though we send a number
fn reservation_hint(object: &Value) -> Option<i64> {
    match object.get("metadata")?.get("reservation_id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_succeeded() {
        let body = br#"{
            "type": "notification",
            "event": "payment.succeeded",
            "object": {"id": "2d1b-pay", "status": "succeeded", "metadata": {"reservation_id": "17"}}
        }"#;

        assert_eq!(
            parse_event(body).unwrap(),
            GatewayEvent::PaymentSucceeded {
                gateway_payment_id: "2d1b-pay".to_string(),
                reservation_hint: Some(17),
            }
        );
    }

    #[test]
    fn test_payment_canceled_without_metadata() {
        let body = br#"{"event": "payment.canceled", "object": {"id": "p-2"}}"#;
        assert_eq!(
            parse_event(body).unwrap(),
            GatewayEvent::PaymentCanceled {
                gateway_payment_id: "p-2".to_string(),
                reservation_hint: None,
            }
        );
    }

    #[test]
    fn test_refund_succeeded_points_at_payment() {
        let body = br#"{"event": "refund.succeeded", "object": {"id": "rf-1", "payment_id": "p-3"}}"#;
        let event = parse_event(body).unwrap();
        assert_eq!(
            event,
            GatewayEvent::RefundSucceeded {
                refund_id: "rf-1".to_string(),
                gateway_payment_id: "p-3".to_string(),
            }
        );
        assert_eq!(event.delivery_key().as_deref(), Some("refund.succeeded:rf-1"));
    }

    #[test]
    fn test_unknown_event_is_unsupported() {
        let body = br#"{"event": "payout.succeeded", "object": {"id": "po-1"}}"#;
        assert_eq!(
            parse_event(body).unwrap(),
            GatewayEvent::Unsupported {
                event: "payout.succeeded".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_bodies_rejected() {
        assert!(matches!(parse_event(b"not json"), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            parse_event(br#"{"object": {"id": "p"}}"#),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_event(br#"{"event": "payment.succeeded", "object": {}}"#),
            Err(AppError::InvalidInput(_))
        ));
    }
}
