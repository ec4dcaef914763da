//! Lifecycle event publishing.
//!
//! Publishing is at-most-once, best-effort: the engine favors availability of
//! the payment state machine over guaranteed delivery, so a failed publish is
//! logged and never rolls back or blocks the transition that triggered it.

pub mod consumer;

use crate::models::{Payment, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub use consumer::{EventConsumer, InboundEvent};

pub const PAYMENT_CREATED_TOPIC: &str = "payment.created";
pub const PAYMENT_PROCESSED_TOPIC: &str = "payment.processed";
pub const PAYMENT_FAILED_TOPIC: &str = "payment.failed";
pub const REFUND_PROCESSED_TOPIC: &str = "payment.refund.processed";
pub const TRANSACTION_STARTED_TOPIC: &str = "payment.transaction.started";
pub const TRANSACTION_COMPLETED_TOPIC: &str = "payment.transaction.completed";
pub const TRANSACTION_FAILED_TOPIC: &str = "payment.transaction.failed";

/// Envelope for every published lifecycle notification.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payment_id: Uuid,
    pub payment_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_number: Option<String>,
    pub customer_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PaymentEvent {
    fn base(payment: &Payment) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payment_id: payment.id,
            payment_number: payment.payment_number.clone(),
            refund_number: None,
            transaction_id: None,
            amount: payment.amount,
            currency: payment.currency.clone(),
            policy_number: payment.policy_number.clone(),
            claim_number: payment.claim_number.clone(),
            customer_number: payment.customer_number.clone(),
            successful: None,
            completion_date: None,
            failure_reason: None,
        }
    }

    pub fn created(payment: &Payment) -> Self {
        Self::base(payment)
    }

    pub fn processed(payment: &Payment, successful: bool) -> Self {
        Self {
            successful: Some(successful),
            completion_date: payment.completion_date,
            failure_reason: payment.failure_reason.clone(),
            ..Self::base(payment)
        }
    }

    pub fn failed(payment: &Payment) -> Self {
        Self {
            successful: Some(false),
            failure_reason: payment.failure_reason.clone(),
            ..Self::base(payment)
        }
    }

    pub fn refund_processed(payment: &Payment, refund_number: &str) -> Self {
        Self {
            refund_number: Some(refund_number.to_string()),
            completion_date: Some(Utc::now()),
            ..Self::base(payment)
        }
    }

    pub fn transaction(payment: &Payment, transaction: &Transaction) -> Self {
        Self {
            transaction_id: Some(transaction.transaction_id.clone()),
            ..Self::base(payment)
        }
    }
}

/// Fire-and-forget publisher to the event bus.
///
/// Implementations log delivery success or failure; they never surface an
/// error to the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &'static str, key: &str, event: PaymentEvent);
}

/// Publisher that renders events to the structured log. Stands in for the
/// bus producer in local runs; the real producer is an external collaborator.
#[derive(Debug, Default, Clone)]
pub struct LoggingPublisher;

impl LoggingPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, topic: &'static str, key: &str, event: PaymentEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                tracing::info!(topic = topic, key = %key, payload = %payload, "event published");
            }
            Err(e) => {
                tracing::error!(topic = topic, key = %key, error = %e, "failed to render event");
            }
        }
        metrics::counter!("payment_events_published_total", "topic" => topic).increment(1);
    }
}
