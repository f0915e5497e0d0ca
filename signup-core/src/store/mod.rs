//! Persistence ports used by the registration and payment services.
//!
//! [`DatabaseProcessor`](crate::framework::DatabaseProcessor) implements them
//! on PostgreSQL by dispatching the command structs in
//! [`crate::entities`]; [`memory::InMemoryStore`] is the single-process
//! implementation used by tests and the server's `--in-memory` mode.
//!
//! Every method is a single atomic store operation. Check-then-write
//! sequences are made atomic by the caller holding the matching lock key.

pub mod memory;
mod postgres;

use crate::entities::RoleRef;
use crate::entities::event_roles::EventRole;
use crate::entities::invitations::GuestInvitation;
use crate::entities::programs::Program;
use crate::entities::purchases::{PaymentTransaction, Purchase};
use crate::entities::registrations::{ParticipantIdentity, Registration, UniquenessScope};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn get_event_role(&self, role: RoleRef) -> Result<Option<EventRole>, StoreError>;

    async fn count_active_registrations(&self, role: RoleRef) -> Result<u32, StoreError>;

    async fn find_active_registration(
        &self,
        role: RoleRef,
        identity: &ParticipantIdentity,
        scope: UniquenessScope,
    ) -> Result<Option<Registration>, StoreError>;

    /// Persist a new registration. If it carries an `invitation_id`, the
    /// invitation is marked accepted in the same operation.
    async fn insert_registration(&self, registration: &Registration) -> Result<(), StoreError>;

    async fn get_registration(&self, registration_id: Uuid)
    -> Result<Option<Registration>, StoreError>;

    /// Returns `false` if the registration was not active.
    async fn cancel_registration(&self, registration_id: Uuid) -> Result<bool, StoreError>;

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GuestInvitation>, StoreError>;

    async fn insert_invitation(&self, invitation: &GuestInvitation) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, StoreError>;

    /// Provisional plus committed class-rep holds of a program.
    async fn count_class_rep_holds(&self, program_id: Uuid) -> Result<u32, StoreError>;

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), StoreError>;

    async fn attach_checkout_session(
        &self,
        purchase_id: Uuid,
        session_id: &str,
    ) -> Result<(), StoreError>;

    async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, StoreError>;

    async fn get_purchase_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Purchase>, StoreError>;

    /// Pending → completed, provisional hold → committed, and the
    /// transaction record, as one unit. Returns `false` if the purchase was
    /// not pending.
    async fn complete_purchase(
        &self,
        purchase_id: Uuid,
        transaction: &PaymentTransaction,
    ) -> Result<bool, StoreError>;

    /// Pending → failed, releasing any provisional hold. Returns `false` if
    /// the purchase was not pending.
    async fn fail_purchase(&self, purchase_id: Uuid) -> Result<bool, StoreError>;
}
