//! Reference-number minting for payments, refunds, invoices, and payment
//! methods.
//!
//! References look like `PAY-20260806-0042-917`: prefix, date, a shared
//! 4-digit sequence that wraps to 1 after 9999, and a 3-digit random salt.
//! The sequence is process-local, so references are NOT cluster-unique; the
//! salt only narrows the collision window. Callers that persist a reference
//! must re-check uniqueness against the store before committing.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const PAYMENT_PREFIX: &str = "PAY";
const REFUND_PREFIX: &str = "REF";
const INVOICE_PREFIX: &str = "INV";
const PAYMENT_METHOD_PREFIX: &str = "PMT";

/// Mints reference numbers from a single shared sequence.
#[derive(Debug, Clone)]
pub struct ReferenceGenerator {
    sequence: Arc<AtomicU32>,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self {
            sequence: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn payment_number(&self) -> String {
        self.reference(PAYMENT_PREFIX)
    }

    pub fn refund_number(&self) -> String {
        self.reference(REFUND_PREFIX)
    }

    pub fn invoice_number(&self) -> String {
        self.reference(INVOICE_PREFIX)
    }

    pub fn payment_method_number(&self) -> String {
        self.reference(PAYMENT_METHOD_PREFIX)
    }

    /// Mint a reference with an arbitrary prefix, drawing from the shared
    /// sequence.
    pub fn reference(&self, prefix: &str) -> String {
        let date = Utc::now().format("%Y%m%d");
        let sequence = self.next_sequence();
        let salt = rand::thread_rng().gen_range(0..1000);
        format!("{}-{}-{:04}-{:03}", prefix, date, sequence, salt)
    }

    fn next_sequence(&self) -> u32 {
        self.sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(if current > 9999 { 2 } else { current + 1 })
            })
            .map(|previous| if previous > 9999 { 1 } else { previous })
            .unwrap_or(1)
    }
}
