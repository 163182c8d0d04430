//! HTTP client for the payment gateway
//!
//! Every call carries an `Idempotence-Key`. Charges get a fresh key each time;
//! refunds are keyed by the payment so a retried refund cannot pay out twice.

use crate::types::{
    clip_description, ErrorResponse, PaymentBody, PaymentResponse, RefundBody, RefundResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tourdesk_core::config::GatewayConfig;
use tourdesk_core::error::AppError;
use tourdesk_core::models::{ChargeRequest, ChargeResult, PaymentStatus, RefundRequest, RefundResult};
use tourdesk_core::traits::PaymentGateway;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const IDEMPOTENCE_HEADER: &str = "Idempotence-Key";

pub struct HttpPaymentGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    /// Build the client with the configured per-call timeout
    pub fn new(config: GatewayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build gateway client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn post<B, T>(&self, path: &str, idempotence_key: &str, body: &B) -> Result<T, AppError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header(IDEMPOTENCE_HEADER, idempotence_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        read_response(response).await
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        warn!("Gateway call timed out");
        AppError::PaymentGateway("gateway did not answer in time".to_string())
    } else {
        warn!(error = %e, "Gateway call failed");
        AppError::PaymentGateway(format!("gateway unreachable: {}", e))
    }
}

async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|e| match (e.code, e.description) {
                (Some(code), Some(description)) => Some(format!("{}: {}", code, description)),
                (code, description) => code.or(description),
            })
            .unwrap_or(text);
        warn!(status = %status, detail = %detail, "Gateway rejected request");
        return Err(AppError::PaymentGateway(format!(
            "gateway returned {}: {}",
            status.as_u16(),
            detail
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::PaymentGateway(format!("unreadable gateway response: {}", e)))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(reservation_id = request.metadata.reservation_id, amount = %request.amount))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult, AppError> {
        let description = clip_description(&request.description);
        let body = PaymentBody::new(request, description, &self.config);
        let key = Uuid::new_v4().to_string();

        let payment: PaymentResponse = self.post("payments", &key, &body).await?;

        let status = PaymentStatus::from_str(&payment.status).unwrap_or_else(|| {
            warn!(status = %payment.status, "Unknown charge status, treating as created");
            PaymentStatus::Created
        });
        info!(gateway_payment_id = %payment.id, status = %status, "Charge created");

        Ok(ChargeResult {
            gateway_payment_id: payment.id,
            status,
            confirmation_url: payment.confirmation.and_then(|c| c.confirmation_url),
        })
    }

    #[instrument(skip(self, request), fields(gateway_payment_id = %request.gateway_payment_id, amount = %request.amount))]
    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, AppError> {
        let key = format!("refund-{}", request.gateway_payment_id);
        let refund: RefundResponse = self.post("refunds", &key, &RefundBody::new(request)).await?;

        debug!(refund_id = %refund.id, status = %refund.status, "Refund answered");
        Ok(RefundResult {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}
