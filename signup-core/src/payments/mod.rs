//! Purchases and payment-provider signals.
//!
//! Initiation persists the purchase as `pending` before asking the
//! [`CheckoutGateway`] for a session, so the record normally exists by the
//! time the provider can call back. Completion and failure signals are
//! serialized per checkout session under
//! [`LockKey::PaymentSession`](crate::locking::LockKey) and are idempotent:
//! redelivery of a signal that was already applied changes nothing.

mod completion;
pub mod gateway;
mod initiation;

pub use completion::{CompleteCheckout, CompletionOutcome, FailCheckout, FailureOutcome};
pub use gateway::{CheckoutGateway, GatewayError, HttpCheckoutGateway, LocalCheckoutGateway};
pub use initiation::{InitiatePurchase, InitiatedPurchase};

use crate::cache::InvalidationCoordinator;
use crate::events::NotificationEventSender;
use crate::framework::ErrorClass;
use crate::locking::{KeyedLock, LockManager, LockTimeout};
use crate::store::{PurchaseStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    #[error("program {0} not found")]
    ProgramNotFound(Uuid),

    #[error("all {limit} class-rep slots of program {program_id} are taken")]
    CapacityExceeded { program_id: Uuid, limit: u32 },

    /// No purchase carries this checkout session (yet).
    #[error("no purchase for checkout session {0}")]
    PurchaseNotFound(String),

    #[error("checkout gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("operation failed: {0}")]
    OperationFailure(#[from] StoreError),
}

impl PaymentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PaymentError::LockTimeout(_) | PaymentError::Gateway(_) => ErrorClass::Retryable,
            PaymentError::CapacityExceeded { .. } => ErrorClass::Rejected,
            PaymentError::ProgramNotFound(_) | PaymentError::PurchaseNotFound(_) => {
                ErrorClass::NotFound
            }
            PaymentError::OperationFailure(_) => ErrorClass::Internal,
        }
    }
}

pub struct PaymentService<L: KeyedLock = LockManager> {
    locks: Arc<L>,
    store: Arc<dyn PurchaseStore>,
    gateway: Arc<dyn CheckoutGateway>,
    cache: InvalidationCoordinator,
    notifications: NotificationEventSender,
    lock_timeout: Option<Duration>,
}

impl<L: KeyedLock> PaymentService<L> {
    pub fn new(
        locks: Arc<L>,
        store: Arc<dyn PurchaseStore>,
        gateway: Arc<dyn CheckoutGateway>,
        cache: InvalidationCoordinator,
        notifications: NotificationEventSender,
    ) -> Self {
        Self {
            locks,
            store,
            gateway,
            cache,
            notifications,
            lock_timeout: None,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ViewCache;
    use crate::entities::programs::Program;
    use crate::entities::purchases::{ClassRepHold, PurchaseStatus};
    use crate::events::{NotificationEvent, NotificationEventReceiver, notification_channel};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use kanau::processor::Processor;
    use rust_decimal::Decimal;
    use signup_sdk::objects::payment::{CheckoutSessionRequest, CheckoutSessionResponse};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Opens sessions locally and records whether the purchase was already
    /// stored as pending when the session was requested.
    struct InspectingGateway {
        store: Arc<InMemoryStore>,
        fail: bool,
        saw_pending_record: AtomicBool,
    }

    #[async_trait]
    impl CheckoutGateway for InspectingGateway {
        async fn create_session(
            &self,
            request: &CheckoutSessionRequest,
        ) -> Result<CheckoutSessionResponse, GatewayError> {
            let stored = self
                .store
                .get_purchase(request.client_reference_id)
                .await
                .unwrap();
            self.saw_pending_record.store(
                stored.is_some_and(|p| p.status == PurchaseStatus::Pending),
                Ordering::SeqCst,
            );
            if self.fail {
                return Err(GatewayError::Rejected {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
            Ok(CheckoutSessionResponse {
                session_id: format!("cs_{}", request.client_reference_id.simple()),
                url: "https://pay.example.com/c/1".parse().unwrap(),
            })
        }
    }

    struct Fixture {
        service: PaymentService,
        store: Arc<InMemoryStore>,
        gateway: Arc<InspectingGateway>,
        notifications: NotificationEventReceiver,
        program: Program,
    }

    fn fixture(class_rep_limit: u32, gateway_fails: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let program = Program {
            id: Uuid::now_v7(),
            title: "Leadership Intensive".into(),
            price: Decimal::new(12500, 2),
            currency: "USD".into(),
            class_rep_limit,
        };
        store.add_program(program.clone());
        let gateway = Arc::new(InspectingGateway {
            store: store.clone(),
            fail: gateway_fails,
            saw_pending_record: AtomicBool::new(false),
        });
        let (tx, rx) = notification_channel();
        let service = PaymentService::new(
            Arc::new(LockManager::default()),
            store.clone(),
            gateway.clone(),
            InvalidationCoordinator::new(Arc::new(ViewCache::new())),
            tx,
        );
        Fixture {
            service,
            store,
            gateway,
            notifications: rx,
            program,
        }
    }

    fn initiate(program_id: Uuid, class_rep: bool) -> InitiatePurchase {
        InitiatePurchase {
            user_id: Uuid::now_v7(),
            program_id,
            class_rep,
        }
    }

    fn completed(session_id: &str) -> CompleteCheckout {
        CompleteCheckout {
            session_id: session_id.to_owned(),
            payment_reference: Some("pi_123".into()),
            amount: None,
            currency: None,
        }
    }

    #[tokio::test]
    async fn test_purchase_persisted_before_session_requested() {
        let f = fixture(0, false);
        let initiated = f.service.process(initiate(f.program.id, false)).await.unwrap();

        assert!(f.gateway.saw_pending_record.load(Ordering::SeqCst));
        let stored = f.store.get_purchase(initiated.purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
        assert_eq!(stored.checkout_session_id, initiated.purchase.checkout_session_id);
    }

    #[tokio::test]
    async fn test_class_rep_pool_is_limited() {
        let f = fixture(1, false);
        f.service.process(initiate(f.program.id, true)).await.unwrap();

        let err = f.service.process(initiate(f.program.id, true)).await.unwrap_err();
        assert!(matches!(err, PaymentError::CapacityExceeded { limit: 1, .. }));
        assert_eq!(err.class(), ErrorClass::Rejected);

        // Ordinary purchases are not limited by the pool.
        f.service.process(initiate(f.program.id, false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_failure_releases_hold() {
        let f = fixture(1, true);
        let err = f.service.process(initiate(f.program.id, true)).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
        assert_eq!(f.store.count_class_rep_holds(f.program.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_completion_is_applied_once() {
        let mut f = fixture(1, false);
        let initiated = f.service.process(initiate(f.program.id, true)).await.unwrap();
        let session_id = initiated.purchase.checkout_session_id.clone().unwrap();

        let first = f.service.process(completed(&session_id)).await.unwrap();
        assert!(matches!(first, CompletionOutcome::Completed(_)));
        assert_eq!(first.purchase().class_rep_hold, Some(ClassRepHold::Committed));

        let second = f.service.process(completed(&session_id)).await.unwrap();
        assert!(matches!(second, CompletionOutcome::AlreadyCompleted(_)));

        assert_eq!(f.store.transactions_for(initiated.purchase.id).len(), 1);
        assert!(matches!(
            f.notifications.try_recv().unwrap(),
            NotificationEvent::PurchaseCompleted { class_rep: true, .. }
        ));
        assert!(f.notifications.try_recv().is_err());

        // A late failure signal must not undo the completion.
        let late = f
            .service
            .process(FailCheckout {
                session_id: session_id.clone(),
            })
            .await
            .unwrap();
        assert!(matches!(late, FailureOutcome::AlreadyFinal(_)));
        assert_eq!(f.store.count_class_rep_holds(f.program.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_releases_hold_once() {
        let f = fixture(1, false);
        let initiated = f.service.process(initiate(f.program.id, true)).await.unwrap();
        let session_id = initiated.purchase.checkout_session_id.clone().unwrap();

        let outcome = f
            .service
            .process(FailCheckout {
                session_id: session_id.clone(),
            })
            .await
            .unwrap();
        match outcome {
            FailureOutcome::Failed(p) => {
                assert_eq!(p.status, PurchaseStatus::Failed);
                assert_eq!(p.class_rep_hold, Some(ClassRepHold::Released));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let again = f.service.process(FailCheckout { session_id }).await.unwrap();
        assert!(matches!(again, FailureOutcome::AlreadyFinal(_)));

        // The released slot can be claimed again.
        f.service.process(initiate(f.program.id, true)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let f = fixture(0, false);
        let err = f.service.process(completed("cs_missing")).await.unwrap_err();
        assert!(matches!(err, PaymentError::PurchaseNotFound(_)));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }
}
