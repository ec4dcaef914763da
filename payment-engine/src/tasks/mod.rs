//! Periodic background jobs.
//!
//! Each task owns a `tokio::time::interval` loop with delayed missed-tick
//! behavior, so a slow run pushes the next one out instead of overlapping
//! it; at most one instance of each task runs at a time.

pub mod reconciliation;
pub mod retry;

pub use reconciliation::{ReconciliationSummary, ReconciliationTask};
pub use retry::{RetrySummary, RetryTask};
