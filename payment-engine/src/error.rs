use crate::models::PaymentStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown currency code: {0}")]
    InvalidCurrency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Stale transition: expected {expected}, found {actual}")]
    StaleTransition {
        expected: PaymentStatus,
        actual: PaymentStatus,
    },

    #[error("Retry attempts exhausted for payment {0}")]
    RetryExhausted(String),

    #[error("Gateway error: {0}")]
    Gateway(anyhow::Error),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl PaymentError {
    /// A stale transition means another writer already moved the payment.
    /// Background tasks treat this as benign and skip the item.
    pub fn is_stale(&self) -> bool {
        matches!(self, PaymentError::StaleTransition { .. })
    }
}
