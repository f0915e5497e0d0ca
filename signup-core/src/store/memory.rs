//! Process-local store backed by hash maps behind one mutex.
//!
//! Each trait method takes the mutex once, so individual operations are
//! atomic but a count followed by an insert is not. That gap is what the
//! lock manager closes.

use super::{PurchaseStore, RegistrationStore, StoreError};
use crate::entities::RoleRef;
use crate::entities::event_roles::EventRole;
use crate::entities::invitations::{GuestInvitation, InvitationStatus};
use crate::entities::programs::Program;
use crate::entities::purchases::{ClassRepHold, PaymentTransaction, Purchase, PurchaseStatus};
use crate::entities::registrations::{
    ParticipantIdentity, Registration, RegistrationStatus, UniquenessScope,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    roles: HashMap<RoleRef, EventRole>,
    registrations: HashMap<Uuid, Registration>,
    invitations: HashMap<Uuid, GuestInvitation>,
    programs: HashMap<Uuid, Program>,
    purchases: HashMap<Uuid, Purchase>,
    transactions: Vec<PaymentTransaction>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_event_role(&self, role: EventRole) {
        self.tables().roles.insert(role.role_ref(), role);
    }

    pub fn add_program(&self, program: Program) {
        self.tables().programs.insert(program.id, program);
    }

    /// Active registrations of one role, oldest first.
    pub fn active_registrations(&self, role: RoleRef) -> Vec<Registration> {
        let mut active: Vec<Registration> = self
            .tables()
            .registrations
            .values()
            .filter(|r| r.role == role && r.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|r| r.created_at);
        active
    }

    pub fn invitation(&self, invitation_id: Uuid) -> Option<GuestInvitation> {
        self.tables().invitations.get(&invitation_id).cloned()
    }

    pub fn transactions_for(&self, purchase_id: Uuid) -> Vec<PaymentTransaction> {
        self.tables()
            .transactions
            .iter()
            .filter(|t| t.purchase_id == purchase_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn get_event_role(&self, role: RoleRef) -> Result<Option<EventRole>, StoreError> {
        Ok(self.tables().roles.get(&role).cloned())
    }

    async fn count_active_registrations(&self, role: RoleRef) -> Result<u32, StoreError> {
        let count = self
            .tables()
            .registrations
            .values()
            .filter(|r| r.role == role && r.is_active())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn find_active_registration(
        &self,
        role: RoleRef,
        identity: &ParticipantIdentity,
        scope: UniquenessScope,
    ) -> Result<Option<Registration>, StoreError> {
        let tables = self.tables();
        let found = tables.registrations.values().find(|r| {
            let in_scope = match scope {
                UniquenessScope::Role => r.role == role,
                UniquenessScope::Event => r.role.event_id == role.event_id,
            };
            in_scope && r.is_active() && r.matches(identity)
        });
        Ok(found.cloned())
    }

    async fn insert_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if let Some(invitation_id) = registration.invitation_id {
            if let Some(invitation) = tables.invitations.get_mut(&invitation_id) {
                if invitation.status == InvitationStatus::Pending {
                    invitation.status = InvitationStatus::Accepted;
                }
            }
        }
        tables
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn get_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.tables().registrations.get(&registration_id).cloned())
    }

    async fn cancel_registration(&self, registration_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        match tables.registrations.get_mut(&registration_id) {
            Some(r) if r.is_active() => {
                r.status = RegistrationStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GuestInvitation>, StoreError> {
        Ok(self
            .tables()
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned())
    }

    async fn insert_invitation(&self, invitation: &GuestInvitation) -> Result<(), StoreError> {
        self.tables()
            .invitations
            .insert(invitation.id, invitation.clone());
        Ok(())
    }
}

#[async_trait]
impl PurchaseStore for InMemoryStore {
    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, StoreError> {
        Ok(self.tables().programs.get(&program_id).cloned())
    }

    async fn count_class_rep_holds(&self, program_id: Uuid) -> Result<u32, StoreError> {
        let count = self
            .tables()
            .purchases
            .values()
            .filter(|p| p.program_id == program_id && p.is_class_rep())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), StoreError> {
        self.tables().purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn attach_checkout_session(
        &self,
        purchase_id: Uuid,
        session_id: &str,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.tables().purchases.get_mut(&purchase_id) {
            p.checkout_session_id = Some(session_id.to_owned());
        }
        Ok(())
    }

    async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.tables().purchases.get(&purchase_id).cloned())
    }

    async fn get_purchase_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Purchase>, StoreError> {
        Ok(self
            .tables()
            .purchases
            .values()
            .find(|p| p.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn complete_purchase(
        &self,
        purchase_id: Uuid,
        transaction: &PaymentTransaction,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let Some(p) = tables.purchases.get_mut(&purchase_id) else {
            return Ok(false);
        };
        if p.status != PurchaseStatus::Pending {
            return Ok(false);
        }
        p.status = PurchaseStatus::Completed;
        p.completed_at = Some(transaction.recorded_at);
        if p.class_rep_hold == Some(ClassRepHold::Provisional) {
            p.class_rep_hold = Some(ClassRepHold::Committed);
        }
        tables.transactions.push(transaction.clone());
        Ok(true)
    }

    async fn fail_purchase(&self, purchase_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let Some(p) = tables.purchases.get_mut(&purchase_id) else {
            return Ok(false);
        };
        if p.status != PurchaseStatus::Pending {
            return Ok(false);
        }
        p.status = PurchaseStatus::Failed;
        if p.class_rep_hold.is_some() {
            p.class_rep_hold = Some(ClassRepHold::Released);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::registrations::{Participant, RegistrationSource};
    use rust_decimal::Decimal;

    fn guest_registration(role: RoleRef, email: &str) -> Registration {
        Registration {
            id: Uuid::now_v7(),
            role,
            participant: Participant::Guest {
                name: "Guest".into(),
                email: email.into(),
                phone: None,
            },
            source: RegistrationSource::GuestSelfRegistration,
            status: RegistrationStatus::Active,
            notes: None,
            invitation_id: None,
            created_at: crate::entities::utc_now(),
        }
    }

    #[tokio::test]
    async fn test_guest_lookup_is_case_insensitive_and_event_scoped() {
        let store = InMemoryStore::new();
        let event_id = Uuid::now_v7();
        let role_a = RoleRef::new(event_id, Uuid::now_v7());
        let role_b = RoleRef::new(event_id, Uuid::now_v7());
        store
            .insert_registration(&guest_registration(role_a, "Ann@Example.com"))
            .await
            .unwrap();

        let identity = ParticipantIdentity::Email("ann@example.com".into());
        let same_role = store
            .find_active_registration(role_b, &identity, UniquenessScope::Role)
            .await
            .unwrap();
        assert!(same_role.is_none());

        let same_event = store
            .find_active_registration(role_b, &identity, UniquenessScope::Event)
            .await
            .unwrap();
        assert!(same_event.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_registration_frees_count() {
        let store = InMemoryStore::new();
        let role = RoleRef::new(Uuid::now_v7(), Uuid::now_v7());
        let registration = guest_registration(role, "bob@example.com");
        store.insert_registration(&registration).await.unwrap();
        assert_eq!(store.count_active_registrations(role).await.unwrap(), 1);

        assert!(store.cancel_registration(registration.id).await.unwrap());
        assert!(!store.cancel_registration(registration.id).await.unwrap());
        assert_eq!(store.count_active_registrations(role).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invitation_accepted_with_registration() {
        let store = InMemoryStore::new();
        let role = RoleRef::new(Uuid::now_v7(), Uuid::now_v7());
        let invitation =
            GuestInvitation::new(role, "Cy".into(), "cy@example.com".into(), None);
        store.insert_invitation(&invitation).await.unwrap();

        let mut registration = guest_registration(role, "cy@example.com");
        registration.invitation_id = Some(invitation.id);
        store.insert_registration(&registration).await.unwrap();

        let stored = store.invitation(invitation.id).unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);
    }

    #[tokio::test]
    async fn test_purchase_transitions_only_from_pending() {
        let store = InMemoryStore::new();
        let program_id = Uuid::now_v7();
        let purchase = Purchase::new_pending(
            Uuid::now_v7(),
            program_id,
            Decimal::new(10000, 2),
            "USD".into(),
            true,
        );
        store.insert_purchase(&purchase).await.unwrap();
        store
            .attach_checkout_session(purchase.id, "cs_1")
            .await
            .unwrap();
        assert_eq!(store.count_class_rep_holds(program_id).await.unwrap(), 1);

        let transaction = PaymentTransaction {
            id: Uuid::now_v7(),
            purchase_id: purchase.id,
            checkout_session_id: "cs_1".into(),
            payment_reference: None,
            amount: purchase.amount,
            currency: purchase.currency.clone(),
            recorded_at: crate::entities::utc_now(),
        };
        assert!(store.complete_purchase(purchase.id, &transaction).await.unwrap());
        assert!(!store.complete_purchase(purchase.id, &transaction).await.unwrap());
        assert!(!store.fail_purchase(purchase.id).await.unwrap());

        let stored = store.get_purchase_by_session("cs_1").await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Completed);
        assert_eq!(stored.class_rep_hold, Some(ClassRepHold::Committed));
        assert_eq!(store.transactions_for(purchase.id).len(), 1);
        assert_eq!(store.count_class_rep_holds(program_id).await.unwrap(), 1);
    }
}
