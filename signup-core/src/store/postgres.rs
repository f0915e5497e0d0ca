use super::{PurchaseStore, RegistrationStore, StoreError};
use crate::entities::RoleRef;
use crate::entities::event_roles::{EventRole, GetEventRole};
use crate::entities::invitations::{GetInvitationByToken, GuestInvitation, InsertInvitation};
use crate::entities::programs::{CountClassRepHolds, GetProgramById, Program};
use crate::entities::purchases::{
    AttachCheckoutSession, CompletePurchase, FailPurchase, GetPurchaseById, GetPurchaseBySession,
    InsertPurchase, PaymentTransaction, Purchase,
};
use crate::entities::registrations::{
    CancelRegistration, CountActiveRegistrations, FindActiveRegistration, GetRegistrationById,
    InsertRegistration, ParticipantIdentity, Registration, UniquenessScope,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use uuid::Uuid;

#[async_trait]
impl RegistrationStore for DatabaseProcessor {
    async fn get_event_role(&self, role: RoleRef) -> Result<Option<EventRole>, StoreError> {
        Ok(self.process(GetEventRole { role }).await?)
    }

    async fn count_active_registrations(&self, role: RoleRef) -> Result<u32, StoreError> {
        Ok(self.process(CountActiveRegistrations { role }).await?)
    }

    async fn find_active_registration(
        &self,
        role: RoleRef,
        identity: &ParticipantIdentity,
        scope: UniquenessScope,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .process(FindActiveRegistration {
                role,
                identity: identity.clone(),
                scope,
            })
            .await?)
    }

    async fn insert_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        Ok(self
            .process(InsertRegistration {
                registration: registration.clone(),
            })
            .await?)
    }

    async fn get_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.process(GetRegistrationById { registration_id }).await?)
    }

    async fn cancel_registration(&self, registration_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.process(CancelRegistration { registration_id }).await?)
    }

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GuestInvitation>, StoreError> {
        Ok(self
            .process(GetInvitationByToken {
                token: token.to_owned(),
            })
            .await?)
    }

    async fn insert_invitation(&self, invitation: &GuestInvitation) -> Result<(), StoreError> {
        Ok(self
            .process(InsertInvitation {
                invitation: invitation.clone(),
            })
            .await?)
    }
}

#[async_trait]
impl PurchaseStore for DatabaseProcessor {
    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, StoreError> {
        Ok(self.process(GetProgramById { program_id }).await?)
    }

    async fn count_class_rep_holds(&self, program_id: Uuid) -> Result<u32, StoreError> {
        Ok(self.process(CountClassRepHolds { program_id }).await?)
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), StoreError> {
        Ok(self
            .process(InsertPurchase {
                purchase: purchase.clone(),
            })
            .await?)
    }

    async fn attach_checkout_session(
        &self,
        purchase_id: Uuid,
        session_id: &str,
    ) -> Result<(), StoreError> {
        Ok(self
            .process(AttachCheckoutSession {
                purchase_id,
                session_id: session_id.to_owned(),
            })
            .await?)
    }

    async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.process(GetPurchaseById { purchase_id }).await?)
    }

    async fn get_purchase_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Purchase>, StoreError> {
        Ok(self
            .process(GetPurchaseBySession {
                session_id: session_id.to_owned(),
            })
            .await?)
    }

    async fn complete_purchase(
        &self,
        purchase_id: Uuid,
        transaction: &PaymentTransaction,
    ) -> Result<bool, StoreError> {
        Ok(self
            .process(CompletePurchase {
                purchase_id,
                transaction: transaction.clone(),
            })
            .await?)
    }

    async fn fail_purchase(&self, purchase_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.process(FailPurchase { purchase_id }).await?)
    }
}
