//! HTTP payment processor client.
//!
//! Speaks a small JSON payments API with basic auth. Transport failures and
//! processor-side 5xx responses surface as the `Unavailable` fallback, never
//! as errors.

use crate::config::GatewayConfig;
use crate::gateway::{GatewayPaymentStatus, PaymentGateway, SubmitOutcome, SubmitRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

#[derive(Debug, Serialize)]
struct GatewayPaymentRequest {
    reference: String,
    amount: Decimal,
    currency: String,
    customer_number: String,
    concept: String,
}

#[derive(Debug, Deserialize)]
struct GatewayPaymentResponse {
    reference: String,
    status: String,
    authorization_code: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn payments_url(&self) -> String {
        format!("{}/payments", self.config.api_base_url)
    }

    fn map_submit_response(&self, response: GatewayPaymentResponse) -> SubmitOutcome {
        match response.status.to_lowercase().as_str() {
            "approved" | "succeeded" | "successful" | "captured" => SubmitOutcome::Accepted {
                gateway_reference: response.reference,
                authorization_code: response.authorization_code.unwrap_or_default(),
            },
            "pending" | "processing" | "accepted" => SubmitOutcome::Pending {
                gateway_reference: response.reference,
            },
            other => SubmitOutcome::Declined {
                code: response.error_code.unwrap_or_else(|| other.to_uppercase()),
                message: response
                    .error_message
                    .unwrap_or_else(|| "Declined by payment processor".to_string()),
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        let body = GatewayPaymentRequest {
            reference: request.reference.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            customer_number: request.customer_number.clone(),
            concept: request.concept.clone(),
        };

        let response = self
            .client
            .post(self.payments_url())
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    reference = %request.reference,
                    error = %e,
                    "payment processor unreachable, treating submission as inconclusive"
                );
                metrics::counter!("payment_gateway_unavailable_total").increment(1);
                return SubmitOutcome::Unavailable;
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, body = %text, "gateway submit response");

        if status.is_success() {
            match serde_json::from_str::<GatewayPaymentResponse>(&text) {
                Ok(parsed) => self.map_submit_response(parsed),
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable gateway response, treating as inconclusive");
                    SubmitOutcome::Unavailable
                }
            }
        } else if status.is_client_error() {
            let parsed: Result<GatewayPaymentResponse, _> = serde_json::from_str(&text);
            let (code, message) = match parsed {
                Ok(r) => (
                    r.error_code.unwrap_or_else(|| "DECLINED".to_string()),
                    r.error_message.unwrap_or(text),
                ),
                Err(_) => ("DECLINED".to_string(), text),
            };
            tracing::info!(reference = %request.reference, code = %code, "gateway declined submission");
            SubmitOutcome::Declined { code, message }
        } else {
            tracing::warn!(
                reference = %request.reference,
                status = %status,
                "payment processor error, treating submission as inconclusive"
            );
            metrics::counter!("payment_gateway_unavailable_total").increment(1);
            SubmitOutcome::Unavailable
        }
    }

    async fn check_status(&self, reference: &str) -> GatewayPaymentStatus {
        let url = format!("{}/{}", self.payments_url(), reference);

        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "status check unreachable");
                return GatewayPaymentStatus::Unavailable;
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // The processor never saw the attempt; the expiration timeout
            // resolves it eventually.
            return GatewayPaymentStatus::Pending;
        }
        if !status.is_success() {
            tracing::warn!(reference = %reference, status = %status, "status check failed");
            return GatewayPaymentStatus::Unavailable;
        }

        match response.json::<GatewayPaymentResponse>().await {
            Ok(parsed) => match parsed.status.to_lowercase().as_str() {
                "approved" | "succeeded" | "successful" | "captured" => {
                    GatewayPaymentStatus::Successful
                }
                "declined" | "failed" | "rejected" => GatewayPaymentStatus::Failed,
                _ => GatewayPaymentStatus::Pending,
            },
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "unparseable status response");
                GatewayPaymentStatus::Unavailable
            }
        }
    }
}
