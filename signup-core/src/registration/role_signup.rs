use super::guard::SignupAttempt;
use super::{RegistrationError, RegistrationService};
use crate::entities::RoleRef;
use crate::entities::registrations::{Participant, Registration, RegistrationSource};
use crate::locking::KeyedLock;
use kanau::processor::Processor;
use uuid::Uuid;

/// An authenticated user signs up for an event role.
#[derive(Debug, Clone)]
pub struct RoleSignup {
    pub role: RoleRef,
    pub user_id: Uuid,
    pub email: String,
    pub notes: Option<String>,
}

impl<L: KeyedLock> Processor<RoleSignup> for RegistrationService<L> {
    type Output = Registration;
    type Error = RegistrationError;

    async fn process(&self, command: RoleSignup) -> Result<Registration, RegistrationError> {
        self.register(SignupAttempt {
            role: command.role,
            participant: Participant::User {
                user_id: command.user_id,
                email: command.email,
            },
            source: RegistrationSource::RoleSignup,
            notes: command.notes,
            public_only: false,
            invitation_token: None,
        })
        .await
    }
}
