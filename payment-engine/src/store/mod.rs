//! Store abstraction for payments, transactions, and payment methods.
//!
//! Durable persistence is an external collaborator; the engine only depends
//! on this contract. All payment mutation goes through the targeted methods
//! here ([`PaymentStore::transition_status`],
//! [`PaymentStore::mark_retry_attempt`]) rather than whole-record writes, so
//! concurrent writers are serialized by the optimistic status check.

pub mod memory;

use crate::error::PaymentError;
use crate::models::{Payment, PaymentMethod, PaymentStatus, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a newly created payment. Rejects duplicate payment numbers.
    async fn insert_payment(&self, payment: Payment) -> Result<Payment, PaymentError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentError>;

    async fn find_by_number(&self, payment_number: &str) -> Result<Option<Payment>, PaymentError>;

    async fn find_by_policy(&self, policy_number: &str) -> Result<Vec<Payment>, PaymentError>;

    /// A bounded page of payments in the given status, oldest first.
    async fn find_by_status(
        &self,
        status: PaymentStatus,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError>;

    /// Failed payments still under the attempt cap whose last retry (or
    /// creation, if never retried) is older than `cutoff`. Oldest first.
    async fn find_failed_eligible_for_retry(
        &self,
        max_attempts: u32,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError>;

    /// Apply a status transition only if the payment is still in `expected`.
    ///
    /// A mismatch means another writer got there first and yields
    /// [`PaymentError::StaleTransition`] without side effects. On success the
    /// store stamps `completion_date` when entering `Completed` and records
    /// `reason` as the failure reason when entering `Failed`, `Cancelled`, or
    /// `Expired`.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError>;

    /// Atomically increment the retry counter and stamp the retry date,
    /// refusing to exceed `max_attempts`.
    async fn mark_retry_attempt(
        &self,
        id: Uuid,
        max_attempts: u32,
    ) -> Result<Payment, PaymentError>;

    async fn append_transaction(&self, transaction: Transaction)
        -> Result<Transaction, PaymentError>;

    async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<Transaction>, PaymentError>;

    /// The most recent PAYMENT-type transaction for a payment, if any.
    async fn latest_payment_transaction(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<Transaction>, PaymentError>;

    async fn find_default_payment_method(
        &self,
        customer_number: &str,
    ) -> Result<Option<PaymentMethod>, PaymentError>;
}
