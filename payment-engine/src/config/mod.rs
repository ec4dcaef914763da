use anyhow::anyhow;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PaymentError;

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub gateway: GatewayConfig,
    pub retry: RetryConfig,
    pub reconciliation: ReconciliationConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub api_base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// Approval percentage for the simulated gateway, 0..=100.
    pub success_rate: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Simulated,
    Http,
}

impl FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(GatewayMode::Simulated),
            "http" => Ok(GatewayMode::Http),
            _ => Err(format!("Invalid gateway mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub cooldown_hours: i64,
    pub batch_size: usize,
    pub schedule_interval_minutes: u64,
}

impl RetryConfig {
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes * 60)
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub interval_minutes: u64,
    pub batch_size: usize,
    pub expiration_hours: i64,
}

impl ReconciliationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub customers_base_url: Option<String>,
    pub policies_base_url: Option<String>,
    pub claims_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenv().ok();

        let mode = env::var("PAYMENT_GATEWAY_MODE")
            .unwrap_or_else(|_| "simulated".to_string())
            .parse()
            .map_err(|e: String| PaymentError::Config(anyhow!(e)))?;
        let api_base_url = env::var("PAYMENT_GATEWAY_API_BASE_URL")
            .unwrap_or_else(|_| "https://gateway.example.com/v1".to_string());
        let key_id = env::var("PAYMENT_GATEWAY_KEY_ID").unwrap_or_default();
        let key_secret = env::var("PAYMENT_GATEWAY_KEY_SECRET").unwrap_or_default();
        if mode == GatewayMode::Http && key_id.is_empty() {
            return Err(PaymentError::Config(anyhow!(
                "PAYMENT_GATEWAY_KEY_ID must be set when PAYMENT_GATEWAY_MODE=http"
            )));
        }

        Ok(Self {
            service_name: "payment-engine".to_string(),
            gateway: GatewayConfig {
                mode,
                api_base_url,
                key_id,
                key_secret: Secret::new(key_secret),
                success_rate: env_parse("PAYMENT_GATEWAY_SUCCESS_RATE", 90),
            },
            retry: RetryConfig {
                max_attempts: env_parse("PAYMENT_RETRY_MAX_ATTEMPTS", 3),
                cooldown_hours: env_parse("PAYMENT_RETRY_INTERVAL_HOURS", 24),
                batch_size: env_parse("PAYMENT_RETRY_BATCH_SIZE", 50),
                schedule_interval_minutes: env_parse("PAYMENT_RETRY_SCHEDULE_INTERVAL_MINUTES", 240),
            },
            reconciliation: ReconciliationConfig {
                interval_minutes: env_parse("PAYMENT_RECONCILIATION_INTERVAL_MINUTES", 15),
                batch_size: env_parse("PAYMENT_RECONCILIATION_BATCH_SIZE", 100),
                expiration_hours: env_parse("PAYMENT_EXPIRATION_HOURS", 24),
            },
            directory: DirectoryConfig {
                customers_base_url: env::var("CUSTOMER_SERVICE_URL").ok(),
                policies_base_url: env::var("POLICY_SERVICE_URL").ok(),
                claims_base_url: env::var("CLAIM_SERVICE_URL").ok(),
            },
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
