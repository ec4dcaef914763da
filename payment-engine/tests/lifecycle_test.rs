mod common;

use common::{StaticDirectory, TestEngine, TEST_CUSTOMER, TEST_POLICY};
use payment_engine::error::PaymentError;
use payment_engine::events::{
    PAYMENT_CREATED_TOPIC, PAYMENT_FAILED_TOPIC, PAYMENT_PROCESSED_TOPIC, REFUND_PROCESSED_TOPIC,
    TRANSACTION_COMPLETED_TOPIC, TRANSACTION_FAILED_TOPIC, TRANSACTION_STARTED_TOPIC,
};
use payment_engine::gateway::SubmitOutcome;
use payment_engine::models::{PaymentStatus, TransactionStatus, TransactionType};
use payment_engine::store::PaymentStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn create_payment_rounds_amount_and_starts_pending() {
    let engine = TestEngine::new();

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(100.005), "USD"))
        .await
        .expect("create payment");

    assert_eq!(payment.amount, dec!(100.01));
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.retry_count, 0);
    assert!(payment.payment_number.starts_with("PAY-"));
    assert_eq!(engine.publisher.topics(), vec![PAYMENT_CREATED_TOPIC]);
}

#[tokio::test]
async fn create_payment_rejects_non_positive_amount() {
    let engine = TestEngine::new();

    let err = engine
        .service
        .create_payment(TestEngine::create_request(dec!(0), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Validation(_)));

    let err = engine
        .service
        .create_payment(TestEngine::create_request(dec!(-5), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Validation(_)));
}

#[tokio::test]
async fn create_payment_rejects_unknown_currency() {
    let engine = TestEngine::new();

    let err = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "ZZZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidCurrency(_)));
}

#[tokio::test]
async fn create_payment_rejects_unknown_customer() {
    let engine =
        TestEngine::with_directory(Arc::new(StaticDirectory::with_customers(&["CUST-OTHER"])));

    let err = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Validation(message) if message.contains(TEST_CUSTOMER)));
}

#[tokio::test]
async fn create_payment_proceeds_when_directory_is_down() {
    let engine = TestEngine::with_directory(Arc::new(StaticDirectory::unavailable()));

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .expect("directory outage must not block payment creation");
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn synchronous_approval_completes_the_payment() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Accepted {
            gateway_reference: "GW-1".to_string(),
            authorization_code: "654321".to_string(),
        })
        .await;

    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.completion_date.is_some());

    let transactions = engine
        .store
        .transactions_for_payment(payment.id)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].status, TransactionStatus::Pending);
    assert_eq!(transactions[1].status, TransactionStatus::Successful);
    assert_eq!(transactions[1].gateway_reference.as_deref(), Some("GW-1"));

    let topics = engine.publisher.topics();
    assert_eq!(
        topics,
        vec![
            PAYMENT_CREATED_TOPIC,
            TRANSACTION_STARTED_TOPIC,
            PAYMENT_PROCESSED_TOPIC,
            TRANSACTION_COMPLETED_TOPIC,
        ]
    );
    let events = engine.publisher.events();
    assert_eq!(events[2].2.successful, Some(true));
}

#[tokio::test]
async fn synchronous_decline_fails_the_payment() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Declined {
            code: "INSUFFICIENT_FUNDS".to_string(),
            message: "Card has no funds".to_string(),
        })
        .await;

    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some("Card has no funds"));

    let transactions = engine
        .store
        .transactions_for_payment(payment.id)
        .await
        .unwrap();
    assert_eq!(transactions[1].status, TransactionStatus::Failed);
    assert_eq!(
        transactions[1].error_code.as_deref(),
        Some("INSUFFICIENT_FUNDS")
    );

    assert_eq!(engine.publisher.count_for_topic(PAYMENT_FAILED_TOPIC), 1);
    assert_eq!(engine.publisher.count_for_topic(TRANSACTION_FAILED_TOPIC), 1);
    let processed_events: Vec<_> = engine
        .publisher
        .events()
        .into_iter()
        .filter(|(topic, _, _)| topic == PAYMENT_PROCESSED_TOPIC)
        .collect();
    assert_eq!(processed_events.len(), 1);
    assert_eq!(processed_events[0].2.successful, Some(false));
}

#[tokio::test]
async fn unreachable_gateway_leaves_payment_in_processing() {
    let engine = TestEngine::new();

    let payment = engine.create_and_submit(SubmitOutcome::Unavailable).await;

    assert_eq!(payment.status, PaymentStatus::Processing);
    assert_eq!(engine.publisher.count_for_topic(PAYMENT_FAILED_TOPIC), 0);

    let stored = engine.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Processing);
}

#[tokio::test]
async fn async_gateway_acceptance_leaves_payment_in_processing() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Pending {
            gateway_reference: "GW-ASYNC".to_string(),
        })
        .await;

    assert_eq!(payment.status, PaymentStatus::Processing);
}

#[tokio::test]
async fn submitting_a_completed_payment_is_illegal() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Accepted {
            gateway_reference: "GW-1".to_string(),
            authorization_code: "1".to_string(),
        })
        .await;

    let err = engine.service.submit_payment(payment.id).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::IllegalTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Processing,
        }
    ));
}

#[tokio::test]
async fn update_status_rejects_illegal_transitions() {
    let engine = TestEngine::new();

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap();

    // PENDING may not jump straight to COMPLETED.
    let err = engine
        .service
        .update_payment_status(payment.id, PaymentStatus::Completed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::IllegalTransition { .. }));
}

#[tokio::test]
async fn concurrent_transitions_with_same_pre_state_leave_one_winner() {
    let engine = TestEngine::new();

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap();

    let first = engine
        .store
        .transition_status(
            payment.id,
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            None,
        )
        .await;
    let second = engine
        .store
        .transition_status(
            payment.id,
            PaymentStatus::Pending,
            PaymentStatus::Cancelled,
            None,
        )
        .await;

    assert!(first.is_ok());
    assert!(matches!(
        second.unwrap_err(),
        PaymentError::StaleTransition {
            expected: PaymentStatus::Pending,
            actual: PaymentStatus::Processing,
        }
    ));
}

#[tokio::test]
async fn cancel_payment_is_idempotent() {
    let engine = TestEngine::new();

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap();

    let cancelled = engine
        .service
        .cancel_payment(&payment.payment_number, "Customer request")
        .await
        .unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    assert_eq!(
        cancelled.failure_reason.as_deref(),
        Some("Customer request")
    );

    // Cancelling again is a no-op, not an error.
    let again = engine
        .service
        .cancel_payment(&payment.payment_number, "Customer request")
        .await
        .unwrap();
    assert_eq!(again.status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn cancel_rejects_terminal_payments() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Accepted {
            gateway_reference: "GW-1".to_string(),
            authorization_code: "1".to_string(),
        })
        .await;

    let err = engine
        .service
        .cancel_payment(&payment.payment_number, "too late")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::IllegalTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Cancelled,
        }
    ));
}

#[tokio::test]
async fn policy_cancellation_sweeps_in_flight_payments() {
    let engine = TestEngine::new();

    let first = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap();
    let second = engine
        .service
        .create_payment(TestEngine::create_request(dec!(20), "USD"))
        .await
        .unwrap();
    // A completed payment on the same policy must be left alone.
    let completed = engine
        .create_and_submit(SubmitOutcome::Accepted {
            gateway_reference: "GW-1".to_string(),
            authorization_code: "1".to_string(),
        })
        .await;

    let cancelled = engine
        .service
        .cancel_pending_for_policy(TEST_POLICY, "Policy cancelled")
        .await
        .unwrap();
    assert_eq!(cancelled, 2);

    for id in [first.id, second.id] {
        let payment = engine.store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
    }
    let untouched = engine.store.find_by_id(completed.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn refund_records_a_transaction_and_publishes() {
    let engine = TestEngine::new();

    let payment = engine
        .create_and_submit(SubmitOutcome::Accepted {
            gateway_reference: "GW-1".to_string(),
            authorization_code: "1".to_string(),
        })
        .await;

    let refund = engine
        .service
        .process_refund(&payment.payment_number, "Policy cancelled mid-term")
        .await
        .unwrap();

    assert_eq!(refund.transaction_type, TransactionType::Refund);
    assert_eq!(refund.status, TransactionStatus::Successful);
    assert!(refund.transaction_id.starts_with("REF-"));
    assert_eq!(engine.publisher.count_for_topic(REFUND_PROCESSED_TOPIC), 1);

    // The payment itself stays terminal.
    let stored = engine.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn refund_requires_a_completed_payment() {
    let engine = TestEngine::new();

    let payment = engine
        .service
        .create_payment(TestEngine::create_request(dec!(10), "USD"))
        .await
        .unwrap();

    let err = engine
        .service
        .process_refund(&payment.payment_number, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Validation(_)));
}
