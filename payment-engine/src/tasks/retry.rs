//! Bounded, cooldown-gated retry of failed payments.
//!
//! A failed payment stays retryable while `retry_count` is under the
//! configured cap and its last attempt is older than the cooldown. Each
//! eligible payment gets exactly one new attempt per run, re-submitted
//! through the same path as a regular submission with the customer's default
//! payment method. A payment that exhausts its attempts stays `Failed` with
//! no further automated action.

use crate::config::RetryConfig;
use crate::error::PaymentError;
use crate::models::{Payment, PaymentStatus};
use crate::services::PaymentService;
use crate::store::PaymentStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

pub struct RetryTask {
    store: Arc<dyn PaymentStore>,
    service: Arc<PaymentService>,
    config: RetryConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub resubmitted: usize,
    /// Customers without a default payment method; warned and skipped.
    pub skipped_no_method: usize,
    pub errors: usize,
}

enum RetryOutcome {
    Resubmitted,
    SkippedNoMethod,
}

impl RetryTask {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        service: Arc<PaymentService>,
        config: RetryConfig,
    ) -> Self {
        Self {
            store,
            service,
            config,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.schedule_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("retry task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "retry run failed");
                        }
                    }
                }
            }
        })
    }

    /// One retry pass over a bounded page of eligible failed payments.
    /// Per-payment errors revert that payment to `Failed` and never abort
    /// the rest of the page.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RetrySummary, PaymentError> {
        let cutoff = Utc::now() - Duration::hours(self.config.cooldown_hours);
        let page = self
            .store
            .find_failed_eligible_for_retry(self.config.max_attempts, cutoff, self.config.batch_size)
            .await?;

        let mut summary = RetrySummary::default();
        if page.is_empty() {
            tracing::debug!("no failed payments eligible for retry");
            return Ok(summary);
        }

        tracing::info!(count = page.len(), "retrying failed payments");
        for payment in page {
            summary.attempted += 1;
            match self.retry_payment(&payment).await {
                Ok(RetryOutcome::Resubmitted) => summary.resubmitted += 1,
                Ok(RetryOutcome::SkippedNoMethod) => summary.skipped_no_method += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(
                        payment_number = %payment.payment_number,
                        error = %e,
                        "retry attempt failed"
                    );
                    metrics::counter!("payment_retry_total", "outcome" => "error").increment(1);
                }
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            resubmitted = summary.resubmitted,
            skipped_no_method = summary.skipped_no_method,
            errors = summary.errors,
            "retry run finished"
        );
        metrics::counter!("payment_retry_runs_total").increment(1);
        Ok(summary)
    }

    async fn retry_payment(&self, payment: &Payment) -> Result<RetryOutcome, PaymentError> {
        tracing::debug!(
            payment_number = %payment.payment_number,
            attempt = payment.retry_count + 1,
            max_attempts = self.config.max_attempts,
            "retrying failed payment"
        );

        let payment = self
            .store
            .mark_retry_attempt(payment.id, self.config.max_attempts)
            .await?;
        self.store
            .transition_status(
                payment.id,
                PaymentStatus::Failed,
                PaymentStatus::Pending,
                None,
            )
            .await?;

        let method = match self
            .store
            .find_default_payment_method(&payment.customer_number)
            .await?
        {
            Some(method) => method,
            None => {
                tracing::warn!(
                    customer_number = %payment.customer_number,
                    payment_number = %payment.payment_number,
                    "no default payment method for customer, skipping retry"
                );
                metrics::counter!("payment_retry_total", "outcome" => "no_method").increment(1);
                return Ok(RetryOutcome::SkippedNoMethod);
            }
        };

        tracing::debug!(
            payment_number = %payment.payment_number,
            method_number = %method.method_number,
            "re-submitting with default payment method"
        );

        match self.service.submit_payment(payment.id).await {
            Ok(submitted) => {
                tracing::info!(
                    payment_number = %submitted.payment_number,
                    status = %submitted.status,
                    retry_count = submitted.retry_count,
                    "retry submission finished"
                );
                metrics::counter!("payment_retry_total", "outcome" => "resubmitted").increment(1);
                Ok(RetryOutcome::Resubmitted)
            }
            Err(e) => {
                self.revert_to_failed(payment.id, format!("Automatic retry failed: {}", e))
                    .await;
                Err(e)
            }
        }
    }

    /// Compensation after a retry attempt blew up mid-flight: put the payment
    /// back in `Failed` so a later run (or nothing, once attempts are
    /// exhausted) picks it up.
    async fn revert_to_failed(&self, payment_id: Uuid, reason: String) {
        let current = match self.store.find_by_id(payment_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(payment_id = %payment_id, error = %e, "could not load payment to revert");
                return;
            }
        };
        if !matches!(
            current.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return;
        }
        if let Err(e) = self
            .store
            .transition_status(
                payment_id,
                current.status,
                PaymentStatus::Failed,
                Some(reason),
            )
            .await
        {
            tracing::error!(payment_id = %payment_id, error = %e, "failed to revert payment after retry error");
        }
    }
}
