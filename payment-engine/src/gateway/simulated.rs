//! Simulated payment processor.
//!
//! Default wiring for local runs and demos: approves a configurable share of
//! submissions and remembers each verdict so later status checks agree with
//! the original outcome.

use crate::gateway::{GatewayPaymentStatus, PaymentGateway, SubmitOutcome, SubmitRequest};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub struct SimulatedGateway {
    /// Percentage of submissions that are approved, 0..=100.
    success_rate: u8,
    latency: Duration,
    verdicts: Mutex<HashMap<String, GatewayPaymentStatus>>,
}

impl SimulatedGateway {
    pub fn new(success_rate: u8) -> Self {
        Self {
            success_rate: success_rate.min(100),
            latency: Duration::from_millis(50),
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn record(&self, reference: &str, status: GatewayPaymentStatus) {
        if let Ok(mut verdicts) = self.verdicts.lock() {
            verdicts.insert(reference.to_string(), status);
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        tokio::time::sleep(self.latency).await;

        let roll: u8 = rand::thread_rng().gen_range(0..100);
        if roll < self.success_rate {
            let gateway_reference = format!("SIM-{}", &Uuid::new_v4().to_string()[..8]);
            let authorization_code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
            self.record(&request.reference, GatewayPaymentStatus::Successful);
            tracing::info!(
                reference = %request.reference,
                gateway_reference = %gateway_reference,
                "simulated gateway approved submission"
            );
            SubmitOutcome::Accepted {
                gateway_reference,
                authorization_code,
            }
        } else {
            self.record(&request.reference, GatewayPaymentStatus::Failed);
            tracing::info!(reference = %request.reference, "simulated gateway declined submission");
            SubmitOutcome::Declined {
                code: "DECLINED".to_string(),
                message: "Transaction declined by payment gateway".to_string(),
            }
        }
    }

    async fn check_status(&self, reference: &str) -> GatewayPaymentStatus {
        self.verdicts
            .lock()
            .map(|verdicts| {
                verdicts
                    .get(reference)
                    .copied()
                    .unwrap_or(GatewayPaymentStatus::Pending)
            })
            .unwrap_or(GatewayPaymentStatus::Unavailable)
    }
}
