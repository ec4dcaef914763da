//! Domain models for the payment lifecycle engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Payment
// ============================================================================

/// A request to move money for a policy, claim, or premium obligation.
///
/// Payments are never deleted; they only advance through the status machine
/// until they reach a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub policy_number: Option<String>,
    pub claim_number: Option<String>,
    pub customer_number: String,
    pub payment_type: PaymentType,
    pub concept: String,
    pub description: Option<String>,
    /// Always rounded to the currency's canonical scale before persistence.
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
    pub last_retry_date: Option<DateTime<Utc>>,
    pub creation_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Premium,
    ClaimPayment,
    Online,
    Refund,
    Fee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Explicit transition table for the payment state machine.
    ///
    /// `Failed -> Pending` is reserved for the retry path; cancellation is
    /// legal only while the payment is still in flight.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::{Cancelled, Completed, Expired, Failed, Pending, Processing};
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Expired)
                | (Processing, Cancelled)
                | (Failed, Pending)
        )
    }

    /// Terminal states admit no further engine-driven transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// One recorded attempt to move money for a payment.
///
/// Transactions are append-only: every attempt and every resolution is a new
/// record, never a mutation of an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub payment_id: Uuid,
    /// Engine-side reference for the attempt; passed to the gateway as the
    /// idempotency key and used for later status checks.
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub transaction_date: DateTime<Utc>,
    pub gateway_reference: Option<String>,
    pub authorization_code: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
}

impl Transaction {
    /// Open a new payment attempt in `Pending`, minting the attempt reference.
    pub fn pending_payment(payment: &Payment) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            transaction_id: Uuid::new_v4().to_string(),
            transaction_type: TransactionType::Payment,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: TransactionStatus::Pending,
            transaction_date: Utc::now(),
            gateway_reference: None,
            authorization_code: None,
            error_code: None,
            error_description: None,
        }
    }

    /// Record a synchronous gateway approval for an earlier attempt.
    pub fn successful_payment(
        payment: &Payment,
        attempt_reference: &str,
        gateway_reference: String,
        authorization_code: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            transaction_id: attempt_reference.to_string(),
            transaction_type: TransactionType::Payment,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: TransactionStatus::Successful,
            transaction_date: Utc::now(),
            gateway_reference: Some(gateway_reference),
            authorization_code: Some(authorization_code),
            error_code: None,
            error_description: None,
        }
    }

    /// Record a synchronous gateway decline for an earlier attempt.
    pub fn failed_payment(
        payment: &Payment,
        attempt_reference: &str,
        error_code: String,
        error_description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            transaction_id: attempt_reference.to_string(),
            transaction_type: TransactionType::Payment,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: TransactionStatus::Failed,
            transaction_date: Utc::now(),
            gateway_reference: None,
            authorization_code: None,
            error_code: Some(error_code),
            error_description: Some(error_description),
        }
    }

    /// Record a processed refund against a completed payment.
    pub fn refund(payment: &Payment, refund_reference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            transaction_id: refund_reference.to_string(),
            transaction_type: TransactionType::Refund,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: TransactionStatus::Successful,
            transaction_date: Utc::now(),
            gateway_reference: None,
            authorization_code: None,
            error_code: None,
            error_description: None,
        }
    }
}

// ============================================================================
// Payment method
// ============================================================================

/// A stored customer payment instrument. Read-only to the engine; the retry
/// task only looks up the customer's default instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub method_number: String,
    pub customer_number: String,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
}
