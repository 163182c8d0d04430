//! Payment model and gateway-facing types
//!
//! A payment mirrors one charge at the external gateway. Its status only moves
//! forward: `created -> succeeded | canceled` and `succeeded -> refunded`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment status as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Charge created, waiting for the payer
    #[default]
    Created,
    /// Charge captured
    Succeeded,
    /// Charge abandoned or declined
    Canceled,
    /// Captured funds returned
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a requested status change relates to the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Legal forward move
    Apply,
    /// Same status again
    Duplicate,
    /// Backwards or skipping move, to be ignored
    Reject,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Parse from string. Gateway "pending" and "waiting_for_capture" map to created.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" | "pending" | "waiting_for_capture" => Some(PaymentStatus::Created),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "canceled" | "cancelled" => Some(PaymentStatus::Canceled),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Classify a move from `self` to `next`
    pub fn change_to(self, next: PaymentStatus) -> StatusChange {
        use PaymentStatus::*;
        match (self, next) {
            (a, b) if a == b => StatusChange::Duplicate,
            (Created, Succeeded) | (Created, Canceled) | (Succeeded, Refunded) => {
                StatusChange::Apply
            }
            _ => StatusChange::Reject,
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub reservation_id: i64,
    /// Identifier assigned by the gateway, the lookup key for webhook events
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment row to insert after a charge was accepted by the gateway
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reservation_id: i64,
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
}

/// Correlation data echoed back by the gateway in webhook payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChargeMetadata {
    pub reservation_id: i64,
    pub session_id: i64,
    pub email: String,
}

/// Outbound charge request
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Total amount, `unit_price * quantity`
    pub amount: Decimal,
    pub currency: String,
    pub payer_email: String,
    pub description: String,
    /// Receipt line: number of seats
    pub quantity: i32,
    /// Receipt line: price per seat
    pub unit_price: Decimal,
    pub metadata: ChargeMetadata,
}

/// Gateway response to a charge
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeResult {
    pub gateway_payment_id: String,
    pub status: PaymentStatus,
    /// Where the payer confirms the charge
    pub confirmation_url: Option<String>,
}

/// Outbound refund request
#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Gateway response to a refund
#[derive(Debug, Clone, PartialEq)]
pub struct RefundResult {
    pub refund_id: String,
    /// Raw gateway status, "succeeded" when the money went back
    pub status: String,
}

impl RefundResult {
    #[inline]
    pub fn is_succeeded(&self) -> bool {
        self.status.eq_ignore_ascii_case("succeeded")
    }
}

/// Gateway callback resolved into a closed set of event kinds
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    PaymentSucceeded {
        gateway_payment_id: String,
        /// Reservation id echoed in metadata, a hint only
        reservation_hint: Option<i64>,
    },
    PaymentCanceled {
        gateway_payment_id: String,
        reservation_hint: Option<i64>,
    },
    RefundSucceeded {
        refund_id: String,
        gateway_payment_id: String,
    },
    /// Any other event name, acknowledged and ignored
    Unsupported { event: String },
}

impl GatewayEvent {
    /// Gateway event name
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::PaymentSucceeded { .. } => "payment.succeeded",
            GatewayEvent::PaymentCanceled { .. } => "payment.canceled",
            GatewayEvent::RefundSucceeded { .. } => "refund.succeeded",
            GatewayEvent::Unsupported { event } => event,
        }
    }

    /// Payment the event applies to
    pub fn gateway_payment_id(&self) -> Option<&str> {
        match self {
            GatewayEvent::PaymentSucceeded {
                gateway_payment_id, ..
            }
            | GatewayEvent::PaymentCanceled {
                gateway_payment_id, ..
            }
            | GatewayEvent::RefundSucceeded {
                gateway_payment_id, ..
            } => Some(gateway_payment_id),
            GatewayEvent::Unsupported { .. } => None,
        }
    }

    /// Status the event asks for
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            GatewayEvent::PaymentSucceeded { .. } => Some(PaymentStatus::Succeeded),
            GatewayEvent::PaymentCanceled { .. } => Some(PaymentStatus::Canceled),
            GatewayEvent::RefundSucceeded { .. } => Some(PaymentStatus::Refunded),
            GatewayEvent::Unsupported { .. } => None,
        }
    }

    /// Key identifying one delivery of this event, used for replay suppression
    pub fn delivery_key(&self) -> Option<String> {
        match self {
            GatewayEvent::RefundSucceeded { refund_id, .. } => {
                Some(format!("{}:{}", self.name(), refund_id))
            }
            GatewayEvent::Unsupported { .. } => None,
            _ => self
                .gateway_payment_id()
                .map(|id| format!("{}:{}", self.name(), id)),
        }
    }
}
