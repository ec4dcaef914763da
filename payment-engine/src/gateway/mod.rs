//! Gateway abstraction over the external payment processor.
//!
//! The contract never raises for an unreachable processor: transport failure
//! maps to the explicit [`SubmitOutcome::Unavailable`] /
//! [`GatewayPaymentStatus::Unavailable`] fallback markers, which callers must
//! treat exactly like an inconclusive `Pending` result. Marking a payment
//! terminal on a fallback response could mis-mark a charge the processor
//! actually accepted.

pub mod http;
pub mod simulated;

use async_trait::async_trait;
use rust_decimal::Decimal;

pub use http::HttpGateway;
pub use simulated::SimulatedGateway;

/// A payment submission forwarded to the processor.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub payment_number: String,
    /// Engine-side attempt reference; doubles as the idempotency key and the
    /// handle for later status checks.
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_number: String,
    pub concept: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The processor accepted and settled the charge synchronously.
    Accepted {
        gateway_reference: String,
        authorization_code: String,
    },
    /// The processor rejected the charge.
    Declined { code: String, message: String },
    /// The processor took the charge for asynchronous settlement.
    Pending { gateway_reference: String },
    /// The processor could not be reached; outcome unknown.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Successful,
    Failed,
    Pending,
    /// Status query failed; must be treated as inconclusive.
    Unavailable,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome;

    async fn check_status(&self, reference: &str) -> GatewayPaymentStatus;
}
