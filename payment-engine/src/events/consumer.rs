//! Inbound bus events that drive the lifecycle engine.
//!
//! The transport (Kafka consumer group, bridge, test harness) feeds decoded
//! events through an mpsc channel; per-event failures are logged and the loop
//! keeps draining.

use crate::models::PaymentType;
use crate::services::{CreatePaymentRequest, PaymentService};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events consumed from other services.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundEvent {
    /// `policy.status.changed`: a cancelled policy takes its in-flight
    /// payments with it.
    PolicyStatusChanged {
        policy_number: String,
        status: String,
    },
    /// `claim.payment.requested`: approved claim awaiting disbursement.
    ClaimPaymentRequested {
        claim_number: String,
        policy_number: Option<String>,
        customer_number: String,
        amount: Decimal,
        currency: String,
    },
    /// `policy.premium.due`: upcoming premium obligation.
    PremiumDue {
        policy_number: String,
        customer_number: String,
        amount: Decimal,
        currency: String,
        due_date: Option<DateTime<Utc>>,
    },
}

pub struct EventConsumer {
    service: Arc<PaymentService>,
    receiver: mpsc::Receiver<InboundEvent>,
    shutdown: CancellationToken,
}

impl EventConsumer {
    pub fn new(
        service: Arc<PaymentService>,
        receiver: mpsc::Receiver<InboundEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            receiver,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("event consumer shutting down");
                    break;
                }
                event = self.receiver.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => {
                            tracing::info!("inbound event channel closed, consumer exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::PolicyStatusChanged {
                policy_number,
                status,
            } => {
                if status != "CANCELLED" {
                    tracing::debug!(policy_number = %policy_number, status = %status, "policy status change ignored");
                    return;
                }
                match self
                    .service
                    .cancel_pending_for_policy(&policy_number, "Policy cancelled")
                    .await
                {
                    Ok(cancelled) => {
                        tracing::info!(
                            policy_number = %policy_number,
                            cancelled = cancelled,
                            "cancelled in-flight payments for cancelled policy"
                        );
                    }
                    Err(e) => {
                        tracing::error!(policy_number = %policy_number, error = %e, "bulk cancellation failed");
                    }
                }
            }
            InboundEvent::ClaimPaymentRequested {
                claim_number,
                policy_number,
                customer_number,
                amount,
                currency,
            } => {
                let request = CreatePaymentRequest {
                    customer_number,
                    policy_number,
                    claim_number: Some(claim_number.clone()),
                    payment_type: PaymentType::ClaimPayment,
                    concept: format!("Claim payment - {}", claim_number),
                    description: None,
                    amount,
                    currency,
                };
                match self.service.create_payment(request).await {
                    Ok(payment) => {
                        tracing::info!(
                            claim_number = %claim_number,
                            payment_number = %payment.payment_number,
                            "payment created for claim"
                        );
                    }
                    Err(e) => {
                        tracing::error!(claim_number = %claim_number, error = %e, "failed to create claim payment");
                    }
                }
            }
            InboundEvent::PremiumDue {
                policy_number,
                customer_number,
                amount,
                currency,
                due_date,
            } => {
                let request = CreatePaymentRequest {
                    customer_number,
                    policy_number: Some(policy_number.clone()),
                    claim_number: None,
                    payment_type: PaymentType::Premium,
                    concept: format!("Insurance premium - {}", policy_number),
                    description: None,
                    amount,
                    currency,
                };
                match self.service.create_payment(request).await {
                    Ok(payment) => {
                        tracing::info!(
                            policy_number = %policy_number,
                            payment_number = %payment.payment_number,
                            due_date = ?due_date,
                            "pending payment created for premium"
                        );
                    }
                    Err(e) => {
                        tracing::error!(policy_number = %policy_number, error = %e, "failed to create premium payment");
                    }
                }
            }
        }
    }
}
