use super::{RegistrationError, RegistrationService};
use crate::cache::registration_tags;
use crate::entities::RoleRef;
use crate::entities::registrations::Registration;
use crate::locking::{KeyedLock, LockKey};
use futures_util::FutureExt;
use kanau::processor::Processor;
use tracing::info;
use uuid::Uuid;

/// Cancel a registration and free its slot.
///
/// Runs under the role's sign-up key so the freed slot is never observed
/// half-released by a concurrent sign-up. Cancelling twice is a no-op.
#[derive(Debug, Clone)]
pub struct CancelSignup {
    pub registration_id: Uuid,
}

impl<L: KeyedLock> Processor<CancelSignup> for RegistrationService<L> {
    type Output = Registration;
    type Error = RegistrationError;

    async fn process(&self, command: CancelSignup) -> Result<Registration, RegistrationError> {
        let registration_id = command.registration_id;
        let registration = self
            .store
            .get_registration(registration_id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(registration_id))?;
        let role = registration.role;

        let key = LockKey::RoleSignup(role).to_string();
        self.locks
            .with_lock(&key, self.lock_timeout, || {
                self.cancel_locked(registration_id, role).boxed()
            })
            .await
    }
}

impl<L: KeyedLock> RegistrationService<L> {
    async fn cancel_locked(
        &self,
        registration_id: Uuid,
        role: RoleRef,
    ) -> Result<Registration, RegistrationError> {
        if self.store.cancel_registration(registration_id).await? {
            self.cache.invalidate(&registration_tags(role)).await;
            info!(%registration_id, %role, "Registration cancelled");
        }
        self.store
            .get_registration(registration_id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(registration_id))
    }
}
