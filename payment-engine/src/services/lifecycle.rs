//! Payment lifecycle service.
//!
//! Creates payments, drives them through the state machine toward
//! settlement, and validates every transition. This is the only component
//! that talks to the gateway on the request path; the reconciliation and
//! retry tasks reuse its operations for their own transitions.

use crate::clients::{Lookup, PartyDirectory};
use crate::error::PaymentError;
use crate::events::{
    EventPublisher, PaymentEvent, PAYMENT_CREATED_TOPIC, PAYMENT_FAILED_TOPIC,
    PAYMENT_PROCESSED_TOPIC, REFUND_PROCESSED_TOPIC, TRANSACTION_COMPLETED_TOPIC,
    TRANSACTION_FAILED_TOPIC, TRANSACTION_STARTED_TOPIC,
};
use crate::gateway::{PaymentGateway, SubmitOutcome, SubmitRequest};
use crate::models::{Payment, PaymentStatus, PaymentType, Transaction};
use crate::store::PaymentStore;
use crate::utils::{money, ReferenceGenerator};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts at minting a store-unique payment number before giving up.
const MINT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub customer_number: String,
    pub policy_number: Option<String>,
    pub claim_number: Option<String>,
    pub payment_type: PaymentType,
    pub concept: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}

pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    directory: Arc<dyn PartyDirectory>,
    references: ReferenceGenerator,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        directory: Arc<dyn PartyDirectory>,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
            directory,
            references: ReferenceGenerator::new(),
        }
    }

    /// Validate, round, and persist a new payment in `Pending`.
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<Payment, PaymentError> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::Validation(format!(
                "payment amount must be positive, got {}",
                request.amount
            )));
        }
        let amount = money::round(request.amount, &request.currency)?;

        self.check_reference(
            "customer",
            &request.customer_number,
            self.directory.customer_exists(&request.customer_number).await,
        )?;
        if let Some(policy_number) = &request.policy_number {
            self.check_reference(
                "policy",
                policy_number,
                self.directory.policy_exists(policy_number).await,
            )?;
        }
        if let Some(claim_number) = &request.claim_number {
            self.check_reference(
                "claim",
                claim_number,
                self.directory.claim_exists(claim_number).await,
            )?;
        }

        let payment_number = self.mint_payment_number().await?;
        let payment = Payment {
            id: Uuid::new_v4(),
            payment_number,
            policy_number: request.policy_number,
            claim_number: request.claim_number,
            customer_number: request.customer_number,
            payment_type: request.payment_type,
            concept: request.concept,
            description: request.description,
            amount,
            currency: request.currency,
            status: PaymentStatus::Pending,
            failure_reason: None,
            retry_count: 0,
            last_retry_date: None,
            creation_date: Utc::now(),
            completion_date: None,
        };

        let payment = self.store.insert_payment(payment).await?;
        tracing::info!(
            payment_number = %payment.payment_number,
            customer_number = %payment.customer_number,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment created"
        );
        metrics::counter!("payments_created_total").increment(1);

        self.publisher
            .publish(
                PAYMENT_CREATED_TOPIC,
                &payment.payment_number,
                PaymentEvent::created(&payment),
            )
            .await;

        Ok(payment)
    }

    /// Submit a pending payment to the gateway and settle the synchronous
    /// outcome. Inconclusive gateway responses leave the payment in
    /// `Processing` for the reconciliation task to resolve.
    pub async fn submit_payment(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        let payment = self.require_payment(payment_id).await?;
        if !payment.status.can_transition_to(PaymentStatus::Processing) {
            return Err(PaymentError::IllegalTransition {
                from: payment.status,
                to: PaymentStatus::Processing,
            });
        }
        let payment = self
            .store
            .transition_status(
                payment_id,
                payment.status,
                PaymentStatus::Processing,
                None,
            )
            .await?;

        let attempt = self
            .store
            .append_transaction(Transaction::pending_payment(&payment))
            .await?;
        self.publisher
            .publish(
                TRANSACTION_STARTED_TOPIC,
                &payment.payment_number,
                PaymentEvent::transaction(&payment, &attempt),
            )
            .await;

        let request = SubmitRequest {
            payment_number: payment.payment_number.clone(),
            reference: attempt.transaction_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            customer_number: payment.customer_number.clone(),
            concept: payment.concept.clone(),
        };

        match self.gateway.submit(&request).await {
            SubmitOutcome::Accepted {
                gateway_reference,
                authorization_code,
            } => {
                let transaction = self
                    .store
                    .append_transaction(Transaction::successful_payment(
                        &payment,
                        &attempt.transaction_id,
                        gateway_reference,
                        authorization_code,
                    ))
                    .await?;
                let payment = self
                    .store
                    .transition_status(
                        payment_id,
                        PaymentStatus::Processing,
                        PaymentStatus::Completed,
                        None,
                    )
                    .await?;

                tracing::info!(payment_number = %payment.payment_number, "payment completed");
                metrics::counter!("payment_submissions_total", "outcome" => "completed")
                    .increment(1);

                self.publisher
                    .publish(
                        PAYMENT_PROCESSED_TOPIC,
                        &payment.payment_number,
                        PaymentEvent::processed(&payment, true),
                    )
                    .await;
                self.publisher
                    .publish(
                        TRANSACTION_COMPLETED_TOPIC,
                        &payment.payment_number,
                        PaymentEvent::transaction(&payment, &transaction),
                    )
                    .await;
                Ok(payment)
            }
            SubmitOutcome::Declined { code, message } => {
                let transaction = self
                    .store
                    .append_transaction(Transaction::failed_payment(
                        &payment,
                        &attempt.transaction_id,
                        code.clone(),
                        message.clone(),
                    ))
                    .await?;
                let payment = self
                    .store
                    .transition_status(
                        payment_id,
                        PaymentStatus::Processing,
                        PaymentStatus::Failed,
                        Some(message),
                    )
                    .await?;

                tracing::warn!(
                    payment_number = %payment.payment_number,
                    code = %code,
                    "payment declined by gateway"
                );
                metrics::counter!("payment_submissions_total", "outcome" => "failed").increment(1);

                self.publisher
                    .publish(
                        PAYMENT_PROCESSED_TOPIC,
                        &payment.payment_number,
                        PaymentEvent::processed(&payment, false),
                    )
                    .await;
                self.publisher
                    .publish(
                        PAYMENT_FAILED_TOPIC,
                        &payment.payment_number,
                        PaymentEvent::failed(&payment),
                    )
                    .await;
                self.publisher
                    .publish(
                        TRANSACTION_FAILED_TOPIC,
                        &payment.payment_number,
                        PaymentEvent::transaction(&payment, &transaction),
                    )
                    .await;
                Ok(payment)
            }
            SubmitOutcome::Pending { gateway_reference } => {
                tracing::info!(
                    payment_number = %payment.payment_number,
                    gateway_reference = %gateway_reference,
                    "gateway accepted for asynchronous settlement, awaiting reconciliation"
                );
                metrics::counter!("payment_submissions_total", "outcome" => "pending").increment(1);
                Ok(payment)
            }
            SubmitOutcome::Unavailable => {
                // Outcome unknown; the charge may have landed. Reconciliation
                // resolves it, never a synchronous FAILED.
                tracing::warn!(
                    payment_number = %payment.payment_number,
                    "gateway unavailable, leaving payment in PROCESSING"
                );
                metrics::counter!("payment_submissions_total", "outcome" => "unavailable")
                    .increment(1);
                Ok(payment)
            }
        }
    }

    /// Apply a validated status transition on behalf of the background tasks.
    pub async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let payment = self.require_payment(payment_id).await?;
        if !payment.status.can_transition_to(status) {
            return Err(PaymentError::IllegalTransition {
                from: payment.status,
                to: status,
            });
        }

        let updated = self
            .store
            .transition_status(payment_id, payment.status, status, reason)
            .await?;

        tracing::info!(
            payment_number = %updated.payment_number,
            from = %payment.status,
            to = %status,
            "payment status updated"
        );

        match status {
            PaymentStatus::Completed => {
                self.publisher
                    .publish(
                        PAYMENT_PROCESSED_TOPIC,
                        &updated.payment_number,
                        PaymentEvent::processed(&updated, true),
                    )
                    .await;
            }
            PaymentStatus::Failed => {
                self.publisher
                    .publish(
                        PAYMENT_FAILED_TOPIC,
                        &updated.payment_number,
                        PaymentEvent::failed(&updated),
                    )
                    .await;
            }
            _ => {}
        }

        Ok(updated)
    }

    /// Cancel an in-flight payment. Cancelling an already-cancelled payment
    /// is a no-op, not an error.
    pub async fn cancel_payment(
        &self,
        payment_number: &str,
        reason: &str,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .find_by_number(payment_number)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", payment_number)))?;

        if payment.status == PaymentStatus::Cancelled {
            tracing::debug!(payment_number = %payment_number, "payment already cancelled");
            return Ok(payment);
        }
        if !payment.status.can_transition_to(PaymentStatus::Cancelled) {
            return Err(PaymentError::IllegalTransition {
                from: payment.status,
                to: PaymentStatus::Cancelled,
            });
        }

        let cancelled = self
            .store
            .transition_status(
                payment.id,
                payment.status,
                PaymentStatus::Cancelled,
                Some(reason.to_string()),
            )
            .await?;

        tracing::info!(payment_number = %payment_number, reason = %reason, "payment cancelled");
        metrics::counter!("payments_cancelled_total").increment(1);
        Ok(cancelled)
    }

    /// Cancel every in-flight payment attached to a policy. Per-item errors
    /// are logged without aborting the rest; returns the cancelled count.
    pub async fn cancel_pending_for_policy(
        &self,
        policy_number: &str,
        reason: &str,
    ) -> Result<usize, PaymentError> {
        let payments = self.store.find_by_policy(policy_number).await?;
        let mut cancelled = 0;
        for payment in payments
            .into_iter()
            .filter(|p| !p.status.is_terminal() && p.status != PaymentStatus::Failed)
        {
            match self
                .store
                .transition_status(
                    payment.id,
                    payment.status,
                    PaymentStatus::Cancelled,
                    Some(reason.to_string()),
                )
                .await
            {
                Ok(_) => cancelled += 1,
                Err(e) if e.is_stale() => {
                    tracing::debug!(
                        payment_number = %payment.payment_number,
                        "payment moved before bulk cancellation, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        payment_number = %payment.payment_number,
                        error = %e,
                        "failed to cancel payment for policy"
                    );
                }
            }
        }
        Ok(cancelled)
    }

    /// Record a refund against a completed payment and announce it.
    pub async fn process_refund(
        &self,
        payment_number: &str,
        reason: &str,
    ) -> Result<Transaction, PaymentError> {
        let payment = self
            .store
            .find_by_number(payment_number)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", payment_number)))?;

        if payment.status != PaymentStatus::Completed {
            return Err(PaymentError::Validation(format!(
                "only completed payments can be refunded, payment {} is {}",
                payment_number, payment.status
            )));
        }

        let refund_number = self.references.refund_number();
        let transaction = self
            .store
            .append_transaction(Transaction::refund(&payment, &refund_number))
            .await?;

        tracing::info!(
            payment_number = %payment_number,
            refund_number = %refund_number,
            reason = %reason,
            "refund processed"
        );
        self.publisher
            .publish(
                REFUND_PROCESSED_TOPIC,
                &refund_number,
                PaymentEvent::refund_processed(&payment, &refund_number),
            )
            .await;

        Ok(transaction)
    }

    pub async fn payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, PaymentError> {
        self.store.find_by_id(payment_id).await
    }

    pub async fn payment_by_number(
        &self,
        payment_number: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        self.store.find_by_number(payment_number).await
    }

    pub async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<Transaction>, PaymentError> {
        self.store.transactions_for_payment(payment_id).await
    }

    async fn require_payment(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        self.store
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {}", payment_id)))
    }

    /// Reference numbers are not globally unique by construction, so every
    /// mint is re-checked against the store and re-drawn on collision.
    async fn mint_payment_number(&self) -> Result<String, PaymentError> {
        for _ in 0..MINT_ATTEMPTS {
            let candidate = self.references.payment_number();
            if self.store.find_by_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::warn!(payment_number = %candidate, "payment number collision, re-minting");
        }
        Err(PaymentError::Conflict(
            "could not mint a unique payment number".to_string(),
        ))
    }

    fn check_reference(
        &self,
        kind: &str,
        number: &str,
        lookup: Lookup,
    ) -> Result<(), PaymentError> {
        match lookup {
            Lookup::Exists => Ok(()),
            Lookup::Missing => Err(PaymentError::Validation(format!(
                "{} {} not found",
                kind, number
            ))),
            Lookup::Unavailable => {
                tracing::warn!(
                    kind = kind,
                    number = %number,
                    "directory unavailable, proceeding without reference validation"
                );
                Ok(())
            }
        }
    }
}
