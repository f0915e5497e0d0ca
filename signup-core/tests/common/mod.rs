//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use signup_core::cache::{CacheError, CacheInvalidator, CacheTag, InvalidationCoordinator};
use signup_core::entities::RoleRef;
use signup_core::entities::event_roles::EventRole;
use signup_core::entities::invitations::GuestInvitation;
use signup_core::entities::programs::Program;
use signup_core::entities::purchases::{PaymentTransaction, Purchase};
use signup_core::entities::registrations::{ParticipantIdentity, Registration, UniquenessScope};
use signup_core::events::{NotificationEvent, NotificationEventReceiver};
use signup_core::store::{InMemoryStore, PurchaseStore, RegistrationStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Delegates to an [`InMemoryStore`] but sleeps before every call, so
/// unguarded check-then-write sequences would interleave.
pub struct SlowStore {
    pub inner: Arc<InMemoryStore>,
    pub delay: Duration,
    pub fail_inserts: AtomicBool,
}

impl SlowStore {
    pub fn new(inner: Arc<InMemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            fail_inserts: AtomicBool::new(false),
        }
    }

    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl RegistrationStore for SlowStore {
    async fn get_event_role(&self, role: RoleRef) -> Result<Option<EventRole>, StoreError> {
        self.pause().await;
        self.inner.get_event_role(role).await
    }

    async fn count_active_registrations(&self, role: RoleRef) -> Result<u32, StoreError> {
        self.pause().await;
        self.inner.count_active_registrations(role).await
    }

    async fn find_active_registration(
        &self,
        role: RoleRef,
        identity: &ParticipantIdentity,
        scope: UniquenessScope,
    ) -> Result<Option<Registration>, StoreError> {
        self.pause().await;
        self.inner.find_active_registration(role, identity, scope).await
    }

    async fn insert_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        self.pause().await;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.inner.insert_registration(registration).await
    }

    async fn get_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        self.pause().await;
        self.inner.get_registration(registration_id).await
    }

    async fn cancel_registration(&self, registration_id: Uuid) -> Result<bool, StoreError> {
        self.pause().await;
        self.inner.cancel_registration(registration_id).await
    }

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<GuestInvitation>, StoreError> {
        self.pause().await;
        self.inner.get_invitation_by_token(token).await
    }

    async fn insert_invitation(&self, invitation: &GuestInvitation) -> Result<(), StoreError> {
        self.pause().await;
        self.inner.insert_invitation(invitation).await
    }
}

#[async_trait]
impl PurchaseStore for SlowStore {
    async fn get_program(&self, program_id: Uuid) -> Result<Option<Program>, StoreError> {
        self.pause().await;
        self.inner.get_program(program_id).await
    }

    async fn count_class_rep_holds(&self, program_id: Uuid) -> Result<u32, StoreError> {
        self.pause().await;
        self.inner.count_class_rep_holds(program_id).await
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), StoreError> {
        self.pause().await;
        self.inner.insert_purchase(purchase).await
    }

    async fn attach_checkout_session(
        &self,
        purchase_id: Uuid,
        session_id: &str,
    ) -> Result<(), StoreError> {
        self.pause().await;
        self.inner.attach_checkout_session(purchase_id, session_id).await
    }

    async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, StoreError> {
        self.pause().await;
        self.inner.get_purchase(purchase_id).await
    }

    async fn get_purchase_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Purchase>, StoreError> {
        self.pause().await;
        self.inner.get_purchase_by_session(session_id).await
    }

    async fn complete_purchase(
        &self,
        purchase_id: Uuid,
        transaction: &PaymentTransaction,
    ) -> Result<bool, StoreError> {
        self.pause().await;
        self.inner.complete_purchase(purchase_id, transaction).await
    }

    async fn fail_purchase(&self, purchase_id: Uuid) -> Result<bool, StoreError> {
        self.pause().await;
        self.inner.fail_purchase(purchase_id).await
    }
}

/// Records invalidated tags; optionally fails every call.
#[derive(Default)]
pub struct RecordingInvalidator {
    pub calls: Mutex<Vec<Vec<CacheTag>>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, tags: &[CacheTag]) -> Result<(), CacheError> {
        self.calls.lock().unwrap().push(tags.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("cache offline".into()));
        }
        Ok(())
    }
}

pub fn coordinator(invalidator: &Arc<RecordingInvalidator>) -> InvalidationCoordinator {
    InvalidationCoordinator::new(invalidator.clone())
}

pub fn event_role(max_participants: u32, open_to_public: bool) -> EventRole {
    EventRole {
        event_id: Uuid::now_v7(),
        role_id: Uuid::now_v7(),
        name: "Volunteer".into(),
        max_participants,
        open_to_public,
    }
}

pub fn drain(rx: &mut NotificationEventReceiver) -> Vec<NotificationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
