//! Payment lifecycle engine.
//!
//! Creates payment records, drives them through a state machine toward
//! settlement, reconciles in-flight payments against the external gateway,
//! and retries failures under a bounded, cooldown-gated policy. Persistence,
//! the gateway protocol, and the event bus are consumed through narrow
//! abstractions ([`store::PaymentStore`], [`gateway::PaymentGateway`],
//! [`events::EventPublisher`]).

pub mod clients;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;
pub mod tasks;
pub mod utils;

pub use error::PaymentError;
pub use startup::Application;
