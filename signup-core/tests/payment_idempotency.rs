//! At-least-once payment provider signals.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{RecordingInvalidator, SlowStore, coordinator, drain};
use futures_util::future::join_all;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use signup_core::cache::CacheTag;
use signup_core::entities::programs::Program;
use signup_core::entities::purchases::{ClassRepHold, PurchaseStatus};
use signup_core::events::{NotificationEvent, notification_channel};
use signup_core::locking::LockManager;
use signup_core::payments::{
    CompleteCheckout, CompletionOutcome, FailCheckout, FailureOutcome, InitiatePurchase,
    LocalCheckoutGateway, PaymentError, PaymentService,
};
use signup_core::store::{InMemoryStore, PurchaseStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    service: Arc<PaymentService>,
    store: Arc<InMemoryStore>,
    invalidator: Arc<RecordingInvalidator>,
    notifications: signup_core::events::NotificationEventReceiver,
    program: Program,
}

fn harness(class_rep_limit: u32) -> Harness {
    harness_with_delay(class_rep_limit, Duration::ZERO)
}

/// Every store call sleeps for `delay` first.
fn harness_with_delay(class_rep_limit: u32, delay: Duration) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let program = Program {
        id: Uuid::now_v7(),
        title: "Worship Team Training".into(),
        price: Decimal::new(4900, 2),
        currency: "USD".into(),
        class_rep_limit,
    };
    store.add_program(program.clone());
    let invalidator = Arc::new(RecordingInvalidator::default());
    let (tx, rx) = notification_channel();
    let service = PaymentService::new(
        Arc::new(LockManager::default()),
        Arc::new(SlowStore::new(store.clone(), delay)),
        Arc::new(LocalCheckoutGateway::new(
            "http://localhost:8080/".parse().unwrap(),
        )),
        coordinator(&invalidator),
        tx,
    );
    Harness {
        service: Arc::new(service),
        store,
        invalidator,
        notifications: rx,
        program,
    }
}

fn completion(session_id: &str) -> CompleteCheckout {
    CompleteCheckout {
        session_id: session_id.to_owned(),
        payment_reference: Some("pi_42".into()),
        amount: Some(Decimal::new(4900, 2)),
        currency: Some("USD".into()),
    }
}

async fn open_session(h: &Harness, class_rep: bool) -> (Uuid, String) {
    let initiated = h
        .service
        .process(InitiatePurchase {
            user_id: Uuid::now_v7(),
            program_id: h.program.id,
            class_rep,
        })
        .await
        .unwrap();
    let session_id = initiated.purchase.checkout_session_id.clone().unwrap();
    (initiated.purchase.id, session_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_completions_transition_once() {
    let mut h = harness(2);
    let (purchase_id, session_id) = open_session(&h, true).await;
    drain(&mut h.notifications);
    h.invalidator.calls.lock().unwrap().clear();

    let deliveries = (0..5).map(|_| {
        let service = h.service.clone();
        let signal = completion(&session_id);
        tokio::spawn(async move { service.process(signal).await })
    });
    let outcomes: Vec<CompletionOutcome> = join_all(deliveries)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, CompletionOutcome::Completed(_)))
        .count();
    let replays = outcomes
        .iter()
        .filter(|o| matches!(o, CompletionOutcome::AlreadyCompleted(_)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(replays, 4);

    assert_eq!(h.store.transactions_for(purchase_id).len(), 1);
    let notifications = drain(&mut h.notifications);
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        notifications[0],
        NotificationEvent::PurchaseCompleted { purchase_id: id, .. } if id == purchase_id
    ));

    let calls = h.invalidator.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&CacheTag::Purchase(purchase_id)));

    let stored = h.store.get_purchase(purchase_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PurchaseStatus::Completed);
    assert_eq!(stored.class_rep_hold, Some(ClassRepHold::Committed));
}

#[tokio::test]
async fn test_sequential_redelivery_is_noop() {
    let mut h = harness(0);
    let (purchase_id, session_id) = open_session(&h, false).await;

    for _ in 0..3 {
        h.service.process(completion(&session_id)).await.unwrap();
    }
    assert_eq!(h.store.transactions_for(purchase_id).len(), 1);
    assert_eq!(drain(&mut h.notifications).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completion_and_failure_race_settles_once() {
    let mut h = harness(1);
    let (purchase_id, session_id) = open_session(&h, true).await;

    let complete = {
        let service = h.service.clone();
        let signal = completion(&session_id);
        tokio::spawn(async move { service.process(signal).await })
    };
    let fail = {
        let service = h.service.clone();
        let signal = FailCheckout {
            session_id: session_id.clone(),
        };
        tokio::spawn(async move { service.process(signal).await })
    };
    let completed = complete.await.unwrap().unwrap();
    let failed = fail.await.unwrap().unwrap();

    let stored = h.store.get_purchase(purchase_id).await.unwrap().unwrap();
    match (completed, failed) {
        (CompletionOutcome::Completed(_), FailureOutcome::AlreadyFinal(_)) => {
            assert_eq!(stored.status, PurchaseStatus::Completed);
            assert_eq!(h.store.transactions_for(purchase_id).len(), 1);
            assert_eq!(drain(&mut h.notifications).len(), 1);
        }
        (CompletionOutcome::AlreadyFailed(_), FailureOutcome::Failed(_)) => {
            assert_eq!(stored.status, PurchaseStatus::Failed);
            assert_eq!(stored.class_rep_hold, Some(ClassRepHold::Released));
            assert!(h.store.transactions_for(purchase_id).is_empty());
            assert!(drain(&mut h.notifications).is_empty());
        }
        other => panic!("inconsistent outcomes {other:?}"),
    }
}

#[tokio::test]
async fn test_completion_before_session_attached_is_not_found() {
    let h = harness(0);
    let err = h.service.process(completion("cs_not_yet")).await.unwrap_err();
    assert!(matches!(err, PaymentError::PurchaseNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_class_rep_pool_never_overfills() {
    let h = harness_with_delay(2, Duration::from_millis(5));

    let attempts = (0..5).map(|_| {
        let service = h.service.clone();
        let command = InitiatePurchase {
            user_id: Uuid::now_v7(),
            program_id: h.program.id,
            class_rep: true,
        };
        tokio::spawn(async move { service.process(command).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(PaymentError::CapacityExceeded { limit: 2, .. })))
        .count();
    assert_eq!(succeeded, 2);
    assert_eq!(rejected, 3);
    assert_eq!(h.store.count_class_rep_holds(h.program.id).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completion_records_transaction_time() {
    let h = harness_with_delay(0, Duration::from_millis(1));
    let (purchase_id, session_id) = open_session(&h, false).await;
    h.service.process(completion(&session_id)).await.unwrap();

    let stored = h.store.get_purchase(purchase_id).await.unwrap().unwrap();
    let transactions = h.store.transactions_for(purchase_id);
    assert_eq!(transactions.len(), 1);
    assert_eq!(stored.completed_at, Some(transactions[0].recorded_at));
}
