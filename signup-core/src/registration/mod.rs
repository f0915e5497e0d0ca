//! Capacity-guarded registration.
//!
//! Four paths claim a slot on an event role: authenticated role signup,
//! guest self-registration, guest invitation acceptance and public
//! registration. All of them funnel into [`guard`], which runs the
//! occupancy check, duplicate check, persist, invalidate sequence under the
//! role's [`LockKey::RoleSignup`](crate::locking::LockKey) key. Cancellation
//! takes the same key.
//!
//! Each path is a command struct executed through
//! `impl Processor<Command> for RegistrationService`.

mod availability;
mod cancel;
mod guard;
mod guest_invitation;
mod guest_signup;
mod public_signup;
mod role_signup;

pub use availability::GetRoleAvailability;
pub use cancel::CancelSignup;
pub use guest_invitation::{AcceptInvitation, InviteGuest};
pub use guest_signup::GuestSelfRegistration;
pub use public_signup::PublicRegistration;
pub use role_signup::RoleSignup;

use crate::cache::InvalidationCoordinator;
use crate::entities::RoleRef;
use crate::entities::invitations::InvitationStatus;
use crate::entities::registrations::ParticipantIdentity;
use crate::events::NotificationEventSender;
use crate::framework::ErrorClass;
use crate::locking::{KeyedLock, LockManager, LockTimeout};
use crate::store::{RegistrationStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    #[error("role {role} is full ({max_participants} of {max_participants} slots taken)")]
    CapacityExceeded { role: RoleRef, max_participants: u32 },

    #[error("{identity} already holds an active registration ({existing})")]
    DuplicateRegistration {
        identity: ParticipantIdentity,
        existing: Uuid,
    },

    #[error("role {0} not found")]
    RoleNotFound(RoleRef),

    #[error("role {0} is not open to public registration")]
    RoleNotOpenToPublic(RoleRef),

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("invitation is no longer pending ({0:?})")]
    InvitationNotPending(InvitationStatus),

    #[error("registration {0} not found")]
    RegistrationNotFound(Uuid),

    /// The store failed; nothing was committed by this call.
    #[error("operation failed: {0}")]
    OperationFailure(#[from] StoreError),
}

impl RegistrationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RegistrationError::LockTimeout(_) => ErrorClass::Retryable,
            RegistrationError::CapacityExceeded { .. }
            | RegistrationError::DuplicateRegistration { .. }
            | RegistrationError::RoleNotOpenToPublic(_)
            | RegistrationError::InvitationNotPending(_) => ErrorClass::Rejected,
            RegistrationError::RoleNotFound(_)
            | RegistrationError::InvitationNotFound
            | RegistrationError::RegistrationNotFound(_) => ErrorClass::NotFound,
            RegistrationError::OperationFailure(_) => ErrorClass::Internal,
        }
    }
}

pub struct RegistrationService<L: KeyedLock = LockManager> {
    locks: Arc<L>,
    store: Arc<dyn RegistrationStore>,
    cache: InvalidationCoordinator,
    notifications: NotificationEventSender,
    /// `None` uses the lock manager's default.
    lock_timeout: Option<Duration>,
}

impl<L: KeyedLock> RegistrationService<L> {
    pub fn new(
        locks: Arc<L>,
        store: Arc<dyn RegistrationStore>,
        cache: InvalidationCoordinator,
        notifications: NotificationEventSender,
    ) -> Self {
        Self {
            locks,
            store,
            cache,
            notifications,
            lock_timeout: None,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn locks(&self) -> &Arc<L> {
        &self.locks
    }
}
