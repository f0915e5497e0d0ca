use super::guard::SignupAttempt;
use super::{RegistrationError, RegistrationService};
use crate::entities::RoleRef;
use crate::entities::registrations::{Participant, Registration, RegistrationSource};
use crate::locking::KeyedLock;
use kanau::processor::Processor;

/// Unauthenticated registration from the public event page. Only roles
/// flagged open-to-public accept it.
#[derive(Debug, Clone)]
pub struct PublicRegistration {
    pub role: RoleRef,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl<L: KeyedLock> Processor<PublicRegistration> for RegistrationService<L> {
    type Output = Registration;
    type Error = RegistrationError;

    async fn process(
        &self,
        command: PublicRegistration,
    ) -> Result<Registration, RegistrationError> {
        self.register(SignupAttempt {
            role: command.role,
            participant: Participant::Guest {
                name: command.name,
                email: command.email,
                phone: command.phone,
            },
            source: RegistrationSource::PublicRegistration,
            notes: command.notes,
            public_only: true,
            invitation_token: None,
        })
        .await
    }
}
