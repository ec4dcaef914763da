//! Engine assembly and lifecycle management.
//!
//! Wires the lifecycle service to its collaborators, spawns the two periodic
//! tasks and the inbound-event consumer, and runs until interrupted.

use crate::clients::HttpPartyDirectory;
use crate::config::{Config, GatewayMode};
use crate::events::{EventConsumer, InboundEvent, LoggingPublisher};
use crate::gateway::{HttpGateway, PaymentGateway, SimulatedGateway};
use crate::services::PaymentService;
use crate::store::{InMemoryStore, PaymentStore};
use crate::tasks::{ReconciliationTask, RetryTask};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INBOUND_CHANNEL_CAPACITY: usize = 256;

pub struct Application {
    config: Config,
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    service: Arc<PaymentService>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: mpsc::Receiver<InboundEvent>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn build(config: Config) -> Self {
        let store: Arc<dyn PaymentStore> = Arc::new(InMemoryStore::new());

        let gateway: Arc<dyn PaymentGateway> = match config.gateway.mode {
            GatewayMode::Http => {
                tracing::info!(base_url = %config.gateway.api_base_url, "using HTTP payment gateway");
                Arc::new(HttpGateway::new(config.gateway.clone()))
            }
            GatewayMode::Simulated => {
                tracing::info!(
                    success_rate = config.gateway.success_rate,
                    "using simulated payment gateway"
                );
                Arc::new(SimulatedGateway::new(config.gateway.success_rate))
            }
        };

        let publisher = Arc::new(LoggingPublisher::new());
        let directory = Arc::new(HttpPartyDirectory::new(config.directory.clone()));
        let service = Arc::new(PaymentService::new(
            store.clone(),
            gateway.clone(),
            publisher,
            directory,
        ));

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        Self {
            config,
            store,
            gateway,
            service,
            inbound_tx,
            inbound_rx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn service(&self) -> Arc<PaymentService> {
        self.service.clone()
    }

    /// Sender half for the inbound-event transport to feed decoded bus
    /// events into the engine.
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundEvent> {
        self.inbound_tx.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the engine until ctrl-c, then cancel the background tasks and
    /// wait for them to drain.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let consumer = EventConsumer::new(
            self.service.clone(),
            self.inbound_rx,
            self.shutdown.clone(),
        );
        let consumer_handle = tokio::spawn(consumer.run());

        let reconciliation = ReconciliationTask::new(
            self.store.clone(),
            self.gateway.clone(),
            self.service.clone(),
            self.config.reconciliation.clone(),
        )
        .spawn(self.shutdown.clone());

        let retry = RetryTask::new(
            self.store.clone(),
            self.service.clone(),
            self.config.retry.clone(),
        )
        .spawn(self.shutdown.clone());

        tracing::info!(
            service = %self.config.service_name,
            reconciliation_interval_minutes = self.config.reconciliation.interval_minutes,
            retry_interval_minutes = self.config.retry.schedule_interval_minutes,
            "payment engine started"
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown signal received");
        self.shutdown.cancel();

        let _ = tokio::join!(consumer_handle, reconciliation, retry);
        Ok(())
    }
}
