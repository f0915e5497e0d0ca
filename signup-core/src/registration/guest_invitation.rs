use super::guard::SignupAttempt;
use super::{RegistrationError, RegistrationService};
use crate::entities::RoleRef;
use crate::entities::invitations::GuestInvitation;
use crate::entities::registrations::{Participant, Registration, RegistrationSource};
use crate::locking::KeyedLock;
use kanau::processor::Processor;
use tracing::info;

/// An organizer invites a guest to a role. Does not take a slot.
#[derive(Debug, Clone)]
pub struct InviteGuest {
    pub role: RoleRef,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl<L: KeyedLock> Processor<InviteGuest> for RegistrationService<L> {
    type Output = GuestInvitation;
    type Error = RegistrationError;

    async fn process(&self, command: InviteGuest) -> Result<GuestInvitation, RegistrationError> {
        if self.store.get_event_role(command.role).await?.is_none() {
            return Err(RegistrationError::RoleNotFound(command.role));
        }
        let invitation =
            GuestInvitation::new(command.role, command.name, command.email, command.phone);
        self.store.insert_invitation(&invitation).await?;
        info!(invitation_id = %invitation.id, role = %command.role, "Guest invited");
        Ok(invitation)
    }
}

/// The invited guest accepts, claiming a slot on the invitation's role.
#[derive(Debug, Clone)]
pub struct AcceptInvitation {
    pub token: String,
}

impl<L: KeyedLock> Processor<AcceptInvitation> for RegistrationService<L> {
    type Output = Registration;
    type Error = RegistrationError;

    async fn process(&self, command: AcceptInvitation) -> Result<Registration, RegistrationError> {
        // Only used to find the role key; status is checked again under the lock.
        let invitation = self
            .store
            .get_invitation_by_token(&command.token)
            .await?
            .ok_or(RegistrationError::InvitationNotFound)?;

        self.register(SignupAttempt {
            role: invitation.role_ref(),
            participant: Participant::Guest {
                name: invitation.name,
                email: invitation.email,
                phone: invitation.phone,
            },
            source: RegistrationSource::GuestInvitation,
            notes: None,
            public_only: false,
            invitation_token: Some(command.token),
        })
        .await
    }
}
