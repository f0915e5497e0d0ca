use super::guard::SignupAttempt;
use super::{RegistrationError, RegistrationService};
use crate::entities::RoleRef;
use crate::entities::registrations::{Participant, Registration, RegistrationSource};
use crate::locking::KeyedLock;
use kanau::processor::Processor;

/// A guest without an account registers themselves for an event role.
#[derive(Debug, Clone)]
pub struct GuestSelfRegistration {
    pub role: RoleRef,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl<L: KeyedLock> Processor<GuestSelfRegistration> for RegistrationService<L> {
    type Output = Registration;
    type Error = RegistrationError;

    async fn process(
        &self,
        command: GuestSelfRegistration,
    ) -> Result<Registration, RegistrationError> {
        self.register(SignupAttempt {
            role: command.role,
            participant: Participant::Guest {
                name: command.name,
                email: command.email,
                phone: command.phone,
            },
            source: RegistrationSource::GuestSelfRegistration,
            notes: command.notes,
            public_only: false,
            invitation_token: None,
        })
        .await
    }
}
