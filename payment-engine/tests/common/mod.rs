#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use payment_engine::clients::{Lookup, PartyDirectory};
use payment_engine::config::{ReconciliationConfig, RetryConfig};
use payment_engine::error::PaymentError;
use payment_engine::events::{EventPublisher, PaymentEvent};
use payment_engine::gateway::{
    GatewayPaymentStatus, PaymentGateway, SubmitOutcome, SubmitRequest,
};
use payment_engine::models::{
    Payment, PaymentMethod, PaymentStatus, PaymentType, Transaction,
};
use payment_engine::services::{CreatePaymentRequest, PaymentService};
use payment_engine::store::{InMemoryStore, PaymentStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_CUSTOMER: &str = "CUST-001";
pub const TEST_POLICY: &str = "POL-001";

// ============================================================================
// Gateway stub
// ============================================================================

/// Programmable gateway double: queued submit outcomes (default: accepted)
/// and per-reference status answers (default: pending).
pub struct StubGateway {
    submit_queue: Mutex<VecDeque<SubmitOutcome>>,
    statuses: Mutex<HashMap<String, GatewayPaymentStatus>>,
    pub submitted: Mutex<Vec<SubmitRequest>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            submit_queue: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_submit(&self, outcome: SubmitOutcome) {
        self.submit_queue.lock().unwrap().push_back(outcome);
    }

    pub fn set_status(&self, reference: &str, status: GatewayPaymentStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(reference.to_string(), status);
    }

    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        self.submitted.lock().unwrap().push(request.clone());
        self.submit_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::Accepted {
                gateway_reference: format!("GW-{}", request.reference),
                authorization_code: "123456".to_string(),
            })
    }

    async fn check_status(&self, reference: &str) -> GatewayPaymentStatus {
        self.statuses
            .lock()
            .unwrap()
            .get(reference)
            .copied()
            .unwrap_or(GatewayPaymentStatus::Pending)
    }
}

// ============================================================================
// Publisher recorder
// ============================================================================

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, String, PaymentEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String, PaymentEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _, _)| topic.clone())
            .collect()
    }

    pub fn count_for_topic(&self, topic: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == topic)
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &'static str, key: &str, event: PaymentEvent) {
        self.events
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), event));
    }
}

// ============================================================================
// Directory stub
// ============================================================================

/// Directory double. With `unavailable` set every lookup degrades; otherwise
/// customers come from the known set and policies/claims always exist.
pub struct StaticDirectory {
    customers: HashSet<String>,
    unavailable: bool,
}

impl StaticDirectory {
    pub fn allowing_all() -> Self {
        Self {
            customers: HashSet::new(),
            unavailable: false,
        }
    }

    pub fn with_customers(customers: &[&str]) -> Self {
        Self {
            customers: customers.iter().map(|c| c.to_string()).collect(),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            customers: HashSet::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl PartyDirectory for StaticDirectory {
    async fn customer_exists(&self, customer_number: &str) -> Lookup {
        if self.unavailable {
            Lookup::Unavailable
        } else if self.customers.is_empty() || self.customers.contains(customer_number) {
            Lookup::Exists
        } else {
            Lookup::Missing
        }
    }

    async fn policy_exists(&self, _policy_number: &str) -> Lookup {
        if self.unavailable {
            Lookup::Unavailable
        } else {
            Lookup::Exists
        }
    }

    async fn claim_exists(&self, _claim_number: &str) -> Lookup {
        if self.unavailable {
            Lookup::Unavailable
        } else {
            Lookup::Exists
        }
    }
}

// ============================================================================
// Store wrapper with injectable append failures
// ============================================================================

/// Delegating store that fails `append_transaction` for selected payments,
/// for exercising the per-item error paths of the batch tasks.
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_appends_for: Mutex<HashSet<Uuid>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_appends_for: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_appends_for(&self, payment_id: Uuid) {
        self.fail_appends_for.lock().unwrap().insert(payment_id);
    }

    pub async fn add_payment_method(&self, method: PaymentMethod) {
        self.inner.add_payment_method(method).await;
    }
}

#[async_trait]
impl PaymentStore for FlakyStore {
    async fn insert_payment(&self, payment: Payment) -> Result<Payment, PaymentError> {
        self.inner.insert_payment(payment).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_number(&self, payment_number: &str) -> Result<Option<Payment>, PaymentError> {
        self.inner.find_by_number(payment_number).await
    }

    async fn find_by_policy(&self, policy_number: &str) -> Result<Vec<Payment>, PaymentError> {
        self.inner.find_by_policy(policy_number).await
    }

    async fn find_by_status(
        &self,
        status: PaymentStatus,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        self.inner.find_by_status(status, limit).await
    }

    async fn find_failed_eligible_for_retry(
        &self,
        max_attempts: u32,
        cutoff: chrono::DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        self.inner
            .find_failed_eligible_for_retry(max_attempts, cutoff, limit)
            .await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        self.inner.transition_status(id, expected, next, reason).await
    }

    async fn mark_retry_attempt(
        &self,
        id: Uuid,
        max_attempts: u32,
    ) -> Result<Payment, PaymentError> {
        self.inner.mark_retry_attempt(id, max_attempts).await
    }

    async fn append_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, PaymentError> {
        if self
            .fail_appends_for
            .lock()
            .unwrap()
            .contains(&transaction.payment_id)
        {
            return Err(PaymentError::Store(anyhow::anyhow!(
                "synthetic transaction append failure"
            )));
        }
        self.inner.append_transaction(transaction).await
    }

    async fn transactions_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<Transaction>, PaymentError> {
        self.inner.transactions_for_payment(payment_id).await
    }

    async fn latest_payment_transaction(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<Transaction>, PaymentError> {
        self.inner.latest_payment_transaction(payment_id).await
    }

    async fn find_default_payment_method(
        &self,
        customer_number: &str,
    ) -> Result<Option<PaymentMethod>, PaymentError> {
        self.inner.find_default_payment_method(customer_number).await
    }
}

// ============================================================================
// Engine harness
// ============================================================================

pub struct TestEngine {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<StubGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub service: Arc<PaymentService>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_directory(Arc::new(StaticDirectory::allowing_all()))
    }

    pub fn with_directory(directory: Arc<dyn PartyDirectory>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(StubGateway::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let service = Arc::new(PaymentService::new(
            store.clone(),
            gateway.clone(),
            publisher.clone(),
            directory,
        ));
        Self {
            store,
            gateway,
            publisher,
            service,
        }
    }

    pub fn create_request(amount: Decimal, currency: &str) -> CreatePaymentRequest {
        CreatePaymentRequest {
            customer_number: TEST_CUSTOMER.to_string(),
            policy_number: Some(TEST_POLICY.to_string()),
            claim_number: None,
            payment_type: PaymentType::Premium,
            concept: "Insurance premium".to_string(),
            description: None,
            amount,
            currency: currency.to_string(),
        }
    }

    /// Create and submit a payment against the queued gateway outcome.
    pub async fn create_and_submit(&self, outcome: SubmitOutcome) -> Payment {
        self.gateway.queue_submit(outcome);
        let payment = self
            .service
            .create_payment(Self::create_request(dec!(100.00), "USD"))
            .await
            .expect("create payment");
        self.service
            .submit_payment(payment.id)
            .await
            .expect("submit payment")
    }
}

pub fn default_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        cooldown_hours: 24,
        batch_size: 50,
        schedule_interval_minutes: 240,
    }
}

pub fn default_reconciliation_config() -> ReconciliationConfig {
    ReconciliationConfig {
        interval_minutes: 15,
        batch_size: 100,
        expiration_hours: 24,
    }
}

/// Insert a payment directly, bypassing the service, with full control over
/// status, age, and retry bookkeeping.
pub async fn seed_payment(
    store: &dyn PaymentStore,
    status: PaymentStatus,
    age_hours: i64,
    retry_count: u32,
    last_retry_hours_ago: Option<i64>,
) -> Payment {
    let id = Uuid::new_v4();
    let payment = Payment {
        id,
        payment_number: format!("PAY-TEST-{}", &id.to_string()[..8]),
        policy_number: Some(TEST_POLICY.to_string()),
        claim_number: None,
        customer_number: TEST_CUSTOMER.to_string(),
        payment_type: PaymentType::Premium,
        concept: "Insurance premium".to_string(),
        description: None,
        amount: dec!(100.00),
        currency: "USD".to_string(),
        status,
        failure_reason: None,
        retry_count,
        last_retry_date: last_retry_hours_ago.map(|h| Utc::now() - Duration::hours(h)),
        creation_date: Utc::now() - Duration::hours(age_hours),
        completion_date: None,
    };
    store.insert_payment(payment).await.expect("seed payment")
}

/// Seed a `Processing` payment with an open attempt, as reconciliation finds
/// them. Returns the payment and the attempt reference.
pub async fn seed_processing_payment(
    store: &dyn PaymentStore,
    age_hours: i64,
) -> (Payment, String) {
    let payment = seed_payment(store, PaymentStatus::Processing, age_hours, 0, None).await;
    let attempt = store
        .append_transaction(Transaction::pending_payment(&payment))
        .await
        .expect("seed transaction");
    (payment, attempt.transaction_id)
}

pub fn default_method(customer_number: &str) -> PaymentMethod {
    PaymentMethod {
        method_number: "PMT-TEST-0001".to_string(),
        customer_number: customer_number.to_string(),
        name: "Primary card".to_string(),
        is_default: true,
        is_active: true,
    }
}
