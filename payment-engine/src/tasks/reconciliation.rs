//! Reconciliation of in-flight payments against the gateway.
//!
//! Payments stuck in `Processing` carry an asynchronous or unknown gateway
//! outcome. Each run re-checks a bounded page against the processor's
//! authoritative status and resolves what it can; payments that stay
//! inconclusive past the expiration timeout are marked `Expired`.

use crate::config::ReconciliationConfig;
use crate::error::PaymentError;
use crate::gateway::{GatewayPaymentStatus, PaymentGateway};
use crate::models::{Payment, PaymentStatus};
use crate::services::PaymentService;
use crate::store::PaymentStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct ReconciliationTask {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    service: Arc<PaymentService>,
    config: ReconciliationConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub completed: usize,
    pub failed: usize,
    pub expired: usize,
    /// Payments with no PAYMENT transaction on record; logged and left alone.
    pub skipped: usize,
    /// Still inconclusive and inside the expiration window.
    pub unresolved: usize,
    pub errors: usize,
}

enum ReconcileOutcome {
    Completed,
    Failed,
    Expired,
    Skipped,
    Unresolved,
}

impl ReconciliationTask {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        service: Arc<PaymentService>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            service,
            config,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("reconciliation task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "reconciliation run failed");
                        }
                    }
                }
            }
        })
    }

    /// One reconciliation pass over a bounded page of `Processing` payments.
    /// Per-payment errors are logged and never abort the rest of the page.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconciliationSummary, PaymentError> {
        let page = self
            .store
            .find_by_status(PaymentStatus::Processing, self.config.batch_size)
            .await?;

        let mut summary = ReconciliationSummary::default();
        if page.is_empty() {
            tracing::debug!("no payments in PROCESSING to reconcile");
            return Ok(summary);
        }

        tracing::info!(count = page.len(), "reconciling in-flight payments");
        for payment in page {
            match self.reconcile_payment(&payment).await {
                Ok(ReconcileOutcome::Completed) => summary.completed += 1,
                Ok(ReconcileOutcome::Failed) => summary.failed += 1,
                Ok(ReconcileOutcome::Expired) => summary.expired += 1,
                Ok(ReconcileOutcome::Skipped) => summary.skipped += 1,
                Ok(ReconcileOutcome::Unresolved) => summary.unresolved += 1,
                Err(e) if e.is_stale() => {
                    // Another writer moved the payment mid-run; nothing to do.
                    tracing::debug!(
                        payment_number = %payment.payment_number,
                        "payment moved during reconciliation, skipping"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(
                        payment_number = %payment.payment_number,
                        error = %e,
                        "failed to reconcile payment"
                    );
                }
            }
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            expired = summary.expired,
            unresolved = summary.unresolved,
            errors = summary.errors,
            "reconciliation run finished"
        );
        metrics::counter!("payment_reconciliation_runs_total").increment(1);
        metrics::counter!("payment_reconciliation_resolved_total")
            .increment((summary.completed + summary.failed + summary.expired) as u64);
        Ok(summary)
    }

    async fn reconcile_payment(
        &self,
        payment: &Payment,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let attempt = match self.store.latest_payment_transaction(payment.id).await? {
            Some(attempt) => attempt,
            None => {
                // Data inconsistency, not fatal: a PROCESSING payment should
                // always have an attempt on record.
                tracing::warn!(
                    payment_number = %payment.payment_number,
                    "no payment transaction found for in-flight payment"
                );
                return Ok(ReconcileOutcome::Skipped);
            }
        };

        let gateway_status = self.gateway.check_status(&attempt.transaction_id).await;
        tracing::debug!(
            payment_number = %payment.payment_number,
            transaction_id = %attempt.transaction_id,
            gateway_status = ?gateway_status,
            "gateway status checked"
        );

        match gateway_status {
            GatewayPaymentStatus::Successful => {
                self.service
                    .update_payment_status(
                        payment.id,
                        PaymentStatus::Completed,
                        Some("Confirmed by gateway reconciliation".to_string()),
                    )
                    .await?;
                Ok(ReconcileOutcome::Completed)
            }
            GatewayPaymentStatus::Failed => {
                self.service
                    .update_payment_status(
                        payment.id,
                        PaymentStatus::Failed,
                        Some("Reported failed by gateway reconciliation".to_string()),
                    )
                    .await?;
                Ok(ReconcileOutcome::Failed)
            }
            GatewayPaymentStatus::Pending | GatewayPaymentStatus::Unavailable => {
                let age = Utc::now() - payment.creation_date;
                if age > Duration::hours(self.config.expiration_hours) {
                    self.service
                        .update_payment_status(
                            payment.id,
                            PaymentStatus::Expired,
                            Some(format!(
                                "Expired after {}h without gateway confirmation",
                                self.config.expiration_hours
                            )),
                        )
                        .await?;
                    Ok(ReconcileOutcome::Expired)
                } else {
                    Ok(ReconcileOutcome::Unresolved)
                }
            }
        }
    }
}
