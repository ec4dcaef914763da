//! In-memory payment store.
//!
//! Backs the binary's default wiring and the test harness. Every mutation
//! takes the write lock for the whole check-and-apply, which is what makes
//! the optimistic status check atomic.

use crate::error::PaymentError;
use crate::models::{Payment, PaymentMethod, PaymentStatus, Transaction, TransactionType};
use crate::store::PaymentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    payments: HashMap<Uuid, Payment>,
    numbers: HashMap<String, Uuid>,
    transactions: HashMap<Uuid, Vec<Transaction>>,
    payment_methods: HashMap<String, Vec<PaymentMethod>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a customer payment method. Methods are collaborator records the
    /// engine never writes, so seeding sits outside the store contract.
    pub async fn add_payment_method(&self, method: PaymentMethod) {
        let mut inner = self.inner.write().await;
        inner
            .payment_methods
            .entry(method.customer_number.clone())
            .or_default()
            .push(method);
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: Payment) -> Result<Payment, PaymentError> {
        let mut inner = self.inner.write().await;
        if inner.numbers.contains_key(&payment.payment_number) {
            return Err(PaymentError::Conflict(format!(
                "payment number {} already exists",
                payment.payment_number
            )));
        }
        inner
            .numbers
            .insert(payment.payment_number.clone(), payment.id);
        inner.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        Ok(inner.payments.get(&id).cloned())
    }

    async fn find_by_number(&self, payment_number: &str) -> Result<Option<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        Ok(inner
            .numbers
            .get(payment_number)
            .and_then(|id| inner.payments.get(id))
            .cloned())
    }

    async fn find_by_policy(&self, policy_number: &str) -> Result<Vec<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.policy_number.as_deref() == Some(policy_number))
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.creation_date);
        Ok(payments)
    }

    async fn find_by_status(
        &self,
        status: PaymentStatus,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.creation_date);
        payments.truncate(limit);
        Ok(payments)
    }

    async fn find_failed_eligible_for_retry(
        &self,
        max_attempts: u32,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| {
                p.status == PaymentStatus::Failed
                    && p.retry_count < max_attempts
                    && p.last_retry_date.unwrap_or(p.creation_date) < cutoff
            })
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.creation_date);
        payments.truncate(limit);
        Ok(payments)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", id)))?;

        if payment.status != expected {
            return Err(PaymentError::StaleTransition {
                expected,
                actual: payment.status,
            });
        }

        payment.status = next;
        match next {
            PaymentStatus::Completed => {
                if payment.completion_date.is_none() {
                    payment.completion_date = Some(Utc::now());
                }
            }
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Expired => {
                if reason.is_some() {
                    payment.failure_reason = reason;
                }
            }
            PaymentStatus::Pending | PaymentStatus::Processing => {}
        }
        Ok(payment.clone())
    }

    async fn mark_retry_attempt(
        &self,
        id: Uuid,
        max_attempts: u32,
    ) -> Result<Payment, PaymentError> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", id)))?;

        if payment.retry_count >= max_attempts {
            return Err(PaymentError::RetryExhausted(payment.payment_number.clone()));
        }

        payment.retry_count += 1;
        payment.last_retry_date = Some(Utc::now());
        Ok(payment.clone())
    }

    async fn append_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, PaymentError> {
        let mut inner = self.inner.write().await;
        if !inner.payments.contains_key(&transaction.payment_id) {
            return Err(PaymentError::NotFound(format!(
                "payment {}",
                transaction.payment_id
            )));
        }
        inner
            .transactions
            .entry(transaction.payment_id)
            .or_default()
            .push(transaction.clone());
        Ok(transaction)
    }

    async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<Transaction>, PaymentError> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .get(&payment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_payment_transaction(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<Transaction>, PaymentError> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(&payment_id).and_then(|txs| {
            txs.iter()
                .rev()
                .find(|t| t.transaction_type == TransactionType::Payment)
                .cloned()
        }))
    }

    async fn find_default_payment_method(
        &self,
        customer_number: &str,
    ) -> Result<Option<PaymentMethod>, PaymentError> {
        let inner = self.inner.read().await;
        Ok(inner.payment_methods.get(customer_number).and_then(|methods| {
            methods
                .iter()
                .find(|m| m.is_default && m.is_active)
                .cloned()
        }))
    }
}
