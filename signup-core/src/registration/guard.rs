//! The shared critical section behind every sign-up path.

use super::{RegistrationError, RegistrationService};
use crate::cache::registration_tags;
use crate::entities::RoleRef;
use crate::entities::event_roles::EventRole;
use crate::entities::invitations::InvitationStatus;
use crate::entities::registrations::{
    Participant, ParticipantIdentity, Registration, RegistrationSource, RegistrationStatus,
    UniquenessScope,
};
use crate::events::{NotificationEvent, enqueue_notification};
use crate::locking::{KeyedLock, LockKey};
use futures_util::FutureExt;
use tracing::info;
use uuid::Uuid;

/// Everything a sign-up path contributes to the guarded sequence.
#[derive(Debug, Clone)]
pub(super) struct SignupAttempt {
    pub role: RoleRef,
    pub participant: Participant,
    pub source: RegistrationSource,
    pub notes: Option<String>,
    /// Only roles flagged open-to-public accept this attempt.
    pub public_only: bool,
    /// Token of the invitation being accepted. Re-read inside the lock.
    pub invitation_token: Option<String>,
}

impl SignupAttempt {
    /// Users may hold several roles of an event but not the same role twice.
    /// Guests are identified by email only and get one role per event.
    fn scope(&self) -> UniquenessScope {
        match self.participant {
            Participant::User { .. } => UniquenessScope::Role,
            Participant::Guest { .. } => UniquenessScope::Event,
        }
    }
}

impl<L: KeyedLock> RegistrationService<L> {
    /// Claim one slot of `attempt.role`.
    ///
    /// Inside the role's lock, in order: re-read the role and its current
    /// occupancy, reject when full, reject duplicates, persist, invalidate
    /// derived views, enqueue the confirmation. No value read before the lock
    /// is trusted.
    ///
    /// Guests are unique per event while the role lock only covers one role,
    /// so a guest attempt first takes the event-wide guest key for its email.
    pub(super) async fn register(
        &self,
        attempt: SignupAttempt,
    ) -> Result<Registration, RegistrationError> {
        let role_key = LockKey::RoleSignup(attempt.role).to_string();
        match (attempt.scope(), attempt.participant.identity()) {
            (UniquenessScope::Event, ParticipantIdentity::Email(email)) => {
                let guest_key = LockKey::GuestSignup {
                    event_id: attempt.role.event_id,
                    email,
                }
                .to_string();
                self.locks
                    .with_lock(&guest_key, self.lock_timeout, || {
                        self.locks.with_lock(&role_key, self.lock_timeout, || {
                            self.register_locked(attempt).boxed()
                        })
                    })
                    .await
            }
            _ => {
                self.locks
                    .with_lock(&role_key, self.lock_timeout, || {
                        self.register_locked(attempt).boxed()
                    })
                    .await
            }
        }
    }

    async fn register_locked(
        &self,
        attempt: SignupAttempt,
    ) -> Result<Registration, RegistrationError> {
        let role = self.eligible_role(&attempt).await?;

        let invitation_id = match &attempt.invitation_token {
            Some(token) => Some(self.pending_invitation(token, attempt.role).await?),
            None => None,
        };

        let occupied = self.store.count_active_registrations(attempt.role).await?;
        if occupied >= role.max_participants {
            info!(role = %attempt.role, occupied, "Role is full");
            return Err(RegistrationError::CapacityExceeded {
                role: attempt.role,
                max_participants: role.max_participants,
            });
        }

        let identity = attempt.participant.identity();
        if let Some(existing) = self
            .store
            .find_active_registration(attempt.role, &identity, attempt.scope())
            .await?
        {
            info!(role = %attempt.role, %identity, "Duplicate registration");
            return Err(RegistrationError::DuplicateRegistration {
                identity,
                existing: existing.id,
            });
        }

        let registration = Registration {
            id: Uuid::now_v7(),
            role: attempt.role,
            participant: attempt.participant.normalized(),
            source: attempt.source,
            status: RegistrationStatus::Active,
            notes: attempt.notes,
            invitation_id,
            created_at: crate::entities::utc_now(),
        };
        self.store.insert_registration(&registration).await?;

        self.cache.invalidate(&registration_tags(registration.role)).await;
        self.notify_confirmed(&registration);

        info!(
            registration_id = %registration.id,
            role = %registration.role,
            source = ?registration.source,
            "Registration created"
        );
        Ok(registration)
    }

    async fn eligible_role(&self, attempt: &SignupAttempt) -> Result<EventRole, RegistrationError> {
        let role = self
            .store
            .get_event_role(attempt.role)
            .await?
            .ok_or(RegistrationError::RoleNotFound(attempt.role))?;
        if attempt.public_only && !role.open_to_public {
            return Err(RegistrationError::RoleNotOpenToPublic(attempt.role));
        }
        Ok(role)
    }

    /// Id of the invitation behind `token`, provided it is still pending and
    /// targets `role`.
    async fn pending_invitation(&self, token: &str, role: RoleRef) -> Result<Uuid, RegistrationError> {
        let invitation = self
            .store
            .get_invitation_by_token(token)
            .await?
            .filter(|i| i.role_ref() == role)
            .ok_or(RegistrationError::InvitationNotFound)?;
        if invitation.status != InvitationStatus::Pending {
            return Err(RegistrationError::InvitationNotPending(invitation.status));
        }
        Ok(invitation.id)
    }

    fn notify_confirmed(&self, registration: &Registration) {
        let event = NotificationEvent::RegistrationConfirmed {
            registration_id: registration.id,
            role: registration.role,
            email: registration.participant.email().to_owned(),
            name: registration.participant.name().map(str::to_owned),
        };
        enqueue_notification(&self.notifications, event);
    }
}
