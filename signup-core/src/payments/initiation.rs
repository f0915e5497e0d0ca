use super::{PaymentError, PaymentService};
use crate::cache::purchase_tags;
use crate::entities::programs::Program;
use crate::entities::purchases::Purchase;
use crate::locking::{KeyedLock, LockKey};
use futures_util::FutureExt;
use kanau::processor::Processor;
use signup_sdk::objects::payment::CheckoutSessionRequest;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// Start buying a program, optionally claiming a class-rep slot.
#[derive(Debug, Clone)]
pub struct InitiatePurchase {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub class_rep: bool,
}

#[derive(Debug, Clone)]
pub struct InitiatedPurchase {
    pub purchase: Purchase,
    pub checkout_url: Url,
}

impl<L: KeyedLock> Processor<InitiatePurchase> for PaymentService<L> {
    type Output = InitiatedPurchase;
    type Error = PaymentError;

    async fn process(&self, command: InitiatePurchase) -> Result<InitiatedPurchase, PaymentError> {
        let program = self
            .store
            .get_program(command.program_id)
            .await?
            .ok_or(PaymentError::ProgramNotFound(command.program_id))?;

        let mut purchase = Purchase::new_pending(
            command.user_id,
            program.id,
            program.price,
            program.currency.clone(),
            command.class_rep,
        );

        // The record must exist before the provider knows the session.
        if command.class_rep {
            self.insert_with_class_rep_hold(&program, &purchase).await?;
        } else {
            self.store.insert_purchase(&purchase).await?;
        }

        let request = CheckoutSessionRequest {
            client_reference_id: purchase.id,
            amount: purchase.amount,
            currency: purchase.currency.clone(),
            description: program.title.clone(),
        };
        let session = match self.gateway.create_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                warn!(purchase_id = %purchase.id, error = %e, "Checkout session not created");
                if let Err(fail_err) = self.store.fail_purchase(purchase.id).await {
                    error!(
                        purchase_id = %purchase.id,
                        error = %fail_err,
                        "Failed to mark purchase failed; class-rep hold stays provisional"
                    );
                }
                self.cache
                    .invalidate(&purchase_tags(purchase.id, program.id))
                    .await;
                return Err(e.into());
            }
        };

        self.store
            .attach_checkout_session(purchase.id, &session.session_id)
            .await?;
        purchase.checkout_session_id = Some(session.session_id);
        self.cache
            .invalidate(&purchase_tags(purchase.id, program.id))
            .await;

        info!(
            purchase_id = %purchase.id,
            program_id = %program.id,
            class_rep = command.class_rep,
            "Purchase initiated"
        );
        Ok(InitiatedPurchase {
            purchase,
            checkout_url: session.url,
        })
    }
}

impl<L: KeyedLock> PaymentService<L> {
    /// Persist `purchase` with a provisional class-rep hold, guarded by the
    /// program's pool key. Provisional and committed holds both count.
    async fn insert_with_class_rep_hold(
        &self,
        program: &Program,
        purchase: &Purchase,
    ) -> Result<(), PaymentError> {
        let key = LockKey::ClassRepPool(program.id).to_string();
        self.locks
            .with_lock(&key, self.lock_timeout, || {
                self.insert_within_pool(program, purchase).boxed()
            })
            .await
    }
}

impl<L: KeyedLock> PaymentService<L> {
    async fn insert_within_pool(
        &self,
        program: &Program,
        purchase: &Purchase,
    ) -> Result<(), PaymentError> {
        let held = self.store.count_class_rep_holds(program.id).await?;
        if held >= program.class_rep_limit {
            info!(program_id = %program.id, held, "Class-rep pool is full");
            return Err(PaymentError::CapacityExceeded {
                program_id: program.id,
                limit: program.class_rep_limit,
            });
        }
        self.store.insert_purchase(purchase).await?;
        self.cache
            .invalidate(&purchase_tags(purchase.id, program.id))
            .await;
        Ok(())
    }
}
