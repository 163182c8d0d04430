//! Wire format of the gateway REST API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tourdesk_core::config::GatewayConfig;
use tourdesk_core::models::{ChargeMetadata, ChargeRequest, RefundRequest};

/// Receipt taxation system sent with every charge
pub const TAX_SYSTEM_CODE: u8 = 1;

/// The gateway rejects longer descriptions
pub const MAX_DESCRIPTION_CHARS: usize = 128;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

impl Amount {
    pub fn new(value: Decimal, currency: &str) -> Self {
        Self {
            value: format!("{:.2}", value.round_dp(2)),
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Confirmation<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Customer<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ReceiptItem<'a> {
    pub description: &'a str,
    pub quantity: String,
    pub amount: Amount,
    pub vat_code: u8,
}

#[derive(Debug, Serialize)]
pub struct Receipt<'a> {
    pub customer: Customer<'a>,
    pub tax_system_code: u8,
    pub items: Vec<ReceiptItem<'a>>,
}

/// `POST /payments`
#[derive(Debug, Serialize)]
pub struct PaymentBody<'a> {
    pub amount: Amount,
    pub confirmation: Confirmation<'a>,
    pub capture: bool,
    pub description: &'a str,
    pub metadata: &'a ChargeMetadata,
    pub receipt: Receipt<'a>,
}

impl<'a> PaymentBody<'a> {
    pub fn new(request: &'a ChargeRequest, description: &'a str, config: &'a GatewayConfig) -> Self {
        Self {
            amount: Amount::new(request.amount, &request.currency),
            confirmation: Confirmation {
                kind: "redirect",
                return_url: &config.return_url,
            },
            capture: true,
            description,
            metadata: &request.metadata,
            receipt: Receipt {
                customer: Customer {
                    email: &request.payer_email,
                },
                tax_system_code: TAX_SYSTEM_CODE,
                items: vec![ReceiptItem {
                    description,
                    quantity: format!("{}.00", request.quantity),
                    amount: Amount::new(request.unit_price, &request.currency),
                    vat_code: config.vat_code,
                }],
            },
        }
    }
}

/// `POST /refunds`
#[derive(Debug, Serialize)]
pub struct RefundBody<'a> {
    pub payment_id: &'a str,
    pub amount: Amount,
}

impl<'a> RefundBody<'a> {
    pub fn new(request: &'a RefundRequest) -> Self {
        Self {
            payment_id: &request.gateway_payment_id,
            amount: Amount::new(request.amount, &request.currency),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationResponse {
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub status: String,
    pub confirmation: Option<ConfirmationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub status: String,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Cut a description to what the gateway accepts, on a char boundary
pub fn clip_description(description: &str) -> &str {
    match description.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((byte_idx, _)) => &description[..byte_idx],
        None => description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> GatewayConfig {
        GatewayConfig {
            api_url: "https://gateway.test/v3".to_string(),
            shop_id: "shop".to_string(),
            secret_key: "secret".to_string(),
            return_url: "https://tourdesk.test/paid".to_string(),
            currency: "RUB".to_string(),
            timeout_secs: 5,
            vat_code: 1,
        }
    }

    #[test]
    fn test_payment_body_shape() {
        let request = ChargeRequest {
            amount: dec!(3000),
            currency: "RUB".to_string(),
            payer_email: "guest@example.com".to_string(),
            description: "Old town walk".to_string(),
            quantity: 2,
            unit_price: dec!(1500),
            metadata: ChargeMetadata {
                reservation_id: 9,
                session_id: 4,
                email: "guest@example.com".to_string(),
            },
        };
        let config = config();
        let body = PaymentBody::new(&request, &request.description, &config);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["amount"]["value"], "3000.00");
        assert_eq!(json["confirmation"]["type"], "redirect");
        assert_eq!(json["capture"], true);
        assert_eq!(json["metadata"]["reservation_id"], 9);
        assert_eq!(json["receipt"]["customer"]["email"], "guest@example.com");
        assert_eq!(json["receipt"]["items"][0]["quantity"], "2.00");
        assert_eq!(json["receipt"]["items"][0]["amount"]["value"], "1500.00");
        assert_eq!(json["receipt"]["items"][0]["vat_code"], 1);
    }

    #[test]
    fn test_amount_rounds_to_cents() {
        assert_eq!(Amount::new(dec!(10.006), "RUB").value, "10.01");
        assert_eq!(Amount::new(dec!(7), "RUB").value, "7.00");
    }

    #[test]
    fn test_clip_description() {
        assert_eq!(clip_description("short"), "short");
        let long = "я".repeat(200);
        assert_eq!(clip_description(&long).chars().count(), MAX_DESCRIPTION_CHARS);
    }
}
