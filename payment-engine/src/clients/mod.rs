//! Remote lookups against the customer, policy, and claim services.
//!
//! These calls enrich validation only; when a downstream service is down the
//! lookup degrades to [`Lookup::Unavailable`] instead of propagating failure,
//! and the engine proceeds with a warning rather than blocking payment flow
//! on an outage.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exists,
    Missing,
    /// The owning service could not answer; treat as unknown.
    Unavailable,
}

#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn customer_exists(&self, customer_number: &str) -> Lookup;

    async fn policy_exists(&self, policy_number: &str) -> Lookup;

    async fn claim_exists(&self, claim_number: &str) -> Lookup;
}

/// Directory backed by the record services' HTTP APIs.
///
/// Any unconfigured base URL behaves as a permanently unavailable service.
#[derive(Clone)]
pub struct HttpPartyDirectory {
    client: Client,
    config: DirectoryConfig,
}

impl HttpPartyDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn exists(&self, base_url: Option<&str>, kind: &str, number: &str) -> Lookup {
        let base_url = match base_url {
            Some(url) => url,
            None => return Lookup::Unavailable,
        };

        let url = format!("{}/{}/{}", base_url, kind, number);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Lookup::Exists,
            Ok(response) if response.status() == StatusCode::NOT_FOUND => Lookup::Missing,
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "directory lookup failed");
                Lookup::Unavailable
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "directory service unreachable");
                Lookup::Unavailable
            }
        }
    }
}

#[async_trait]
impl PartyDirectory for HttpPartyDirectory {
    async fn customer_exists(&self, customer_number: &str) -> Lookup {
        self.exists(
            self.config.customers_base_url.as_deref(),
            "customers",
            customer_number,
        )
        .await
    }

    async fn policy_exists(&self, policy_number: &str) -> Lookup {
        self.exists(
            self.config.policies_base_url.as_deref(),
            "policies",
            policy_number,
        )
        .await
    }

    async fn claim_exists(&self, claim_number: &str) -> Lookup {
        self.exists(
            self.config.claims_base_url.as_deref(),
            "claims",
            claim_number,
        )
        .await
    }
}
