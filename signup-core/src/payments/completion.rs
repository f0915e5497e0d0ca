use super::{PaymentError, PaymentService};
use crate::cache::purchase_tags;
use crate::entities::purchases::{PaymentTransaction, Purchase, PurchaseStatus};
use crate::events::{NotificationEvent, enqueue_notification};
use crate::locking::{KeyedLock, LockKey};
use futures_util::FutureExt;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The provider reports a checkout session as paid. May be delivered any
/// number of times.
#[derive(Debug, Clone)]
pub struct CompleteCheckout {
    pub session_id: String,
    pub payment_reference: Option<String>,
    /// Amount the provider captured; the purchase amount when absent.
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This delivery performed the transition.
    Completed(Purchase),
    /// An earlier delivery already did; nothing changed.
    AlreadyCompleted(Purchase),
    /// The purchase had already failed; nothing changed.
    AlreadyFailed(Purchase),
}

impl CompletionOutcome {
    pub fn purchase(&self) -> &Purchase {
        match self {
            CompletionOutcome::Completed(p)
            | CompletionOutcome::AlreadyCompleted(p)
            | CompletionOutcome::AlreadyFailed(p) => p,
        }
    }
}

impl<L: KeyedLock> Processor<CompleteCheckout> for PaymentService<L> {
    type Output = CompletionOutcome;
    type Error = PaymentError;

    async fn process(&self, signal: CompleteCheckout) -> Result<CompletionOutcome, PaymentError> {
        let key = LockKey::PaymentSession(signal.session_id.clone()).to_string();
        self.locks
            .with_lock(&key, self.lock_timeout, || self.complete_locked(signal).boxed())
            .await
    }
}

impl<L: KeyedLock> PaymentService<L> {
    async fn complete_locked(
        &self,
        signal: CompleteCheckout,
    ) -> Result<CompletionOutcome, PaymentError> {
        let purchase = self.purchase_for_session(&signal.session_id).await?;
        match purchase.status {
            PurchaseStatus::Completed => {
                debug!(purchase_id = %purchase.id, "Completion already applied");
                return Ok(CompletionOutcome::AlreadyCompleted(purchase));
            }
            PurchaseStatus::Failed => {
                warn!(
                    purchase_id = %purchase.id,
                    session_id = %signal.session_id,
                    "Completion signal for a failed purchase; needs manual reconciliation"
                );
                return Ok(CompletionOutcome::AlreadyFailed(purchase));
            }
            PurchaseStatus::Pending => {}
        }

        let amount = signal.amount.unwrap_or(purchase.amount);
        if amount != purchase.amount {
            warn!(
                purchase_id = %purchase.id,
                expected = %purchase.amount,
                captured = %amount,
                "Captured amount differs from purchase amount"
            );
        }
        let transaction = PaymentTransaction {
            id: Uuid::now_v7(),
            purchase_id: purchase.id,
            checkout_session_id: signal.session_id.clone(),
            payment_reference: signal.payment_reference,
            amount,
            currency: signal.currency.unwrap_or_else(|| purchase.currency.clone()),
            recorded_at: crate::entities::utc_now(),
        };
        if !self.store.complete_purchase(purchase.id, &transaction).await? {
            // Only reachable if something outside this key changed the status.
            let current = self.purchase_for_session(&signal.session_id).await?;
            return Ok(CompletionOutcome::AlreadyCompleted(current));
        }
        let completed = self.purchase_for_session(&signal.session_id).await?;

        self.cache
            .invalidate(&purchase_tags(completed.id, completed.program_id))
            .await;

        let event = NotificationEvent::PurchaseCompleted {
            purchase_id: completed.id,
            program_id: completed.program_id,
            user_id: completed.user_id,
            class_rep: completed.is_class_rep(),
        };
        enqueue_notification(&self.notifications, event);

        info!(purchase_id = %completed.id, session_id = %signal.session_id, "Purchase completed");
        Ok(CompletionOutcome::Completed(completed))
    }

    async fn purchase_for_session(&self, session_id: &str) -> Result<Purchase, PaymentError> {
        self.store
            .get_purchase_by_session(session_id)
            .await?
            .ok_or_else(|| PaymentError::PurchaseNotFound(session_id.to_owned()))
    }
}

/// The provider reports a checkout session as expired or failed.
#[derive(Debug, Clone)]
pub struct FailCheckout {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// This delivery moved the purchase to failed and released its hold.
    Failed(Purchase),
    /// The purchase was already completed or failed; nothing changed.
    AlreadyFinal(Purchase),
}

impl<L: KeyedLock> Processor<FailCheckout> for PaymentService<L> {
    type Output = FailureOutcome;
    type Error = PaymentError;

    async fn process(&self, signal: FailCheckout) -> Result<FailureOutcome, PaymentError> {
        let key = LockKey::PaymentSession(signal.session_id.clone()).to_string();
        self.locks
            .with_lock(&key, self.lock_timeout, || self.fail_locked(signal).boxed())
            .await
    }
}

impl<L: KeyedLock> PaymentService<L> {
    async fn fail_locked(&self, signal: FailCheckout) -> Result<FailureOutcome, PaymentError> {
        let purchase = self.purchase_for_session(&signal.session_id).await?;
        if purchase.status.is_final() || !self.store.fail_purchase(purchase.id).await? {
            debug!(purchase_id = %purchase.id, status = ?purchase.status, "Failure signal ignored");
            return Ok(FailureOutcome::AlreadyFinal(purchase));
        }
        let failed = self.purchase_for_session(&signal.session_id).await?;
        self.cache
            .invalidate(&purchase_tags(failed.id, failed.program_id))
            .await;
        info!(purchase_id = %failed.id, session_id = %signal.session_id, "Purchase failed");
        Ok(FailureOutcome::Failed(failed))
    }
}
