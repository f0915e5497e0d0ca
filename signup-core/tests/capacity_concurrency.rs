//! Concurrent sign-ups against limited role capacity.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{RecordingInvalidator, SlowStore, coordinator, drain, event_role};
use futures_util::future::join_all;
use kanau::processor::Processor;
use signup_core::cache::CacheTag;
use signup_core::config::LockConfig;
use signup_core::entities::RoleRef;
use signup_core::entities::event_roles::EventRole;
use signup_core::events::notification_channel;
use signup_core::locking::{LockKey, LockManager};
use signup_core::registration::{
    AcceptInvitation, GuestSelfRegistration, InviteGuest, PublicRegistration, RegistrationError,
    RegistrationService, RoleSignup,
};
use signup_core::store::InMemoryStore;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

struct Harness {
    service: Arc<RegistrationService>,
    locks: Arc<LockManager>,
    memory: Arc<InMemoryStore>,
    store: Arc<SlowStore>,
    invalidator: Arc<RecordingInvalidator>,
    notifications: signup_core::events::NotificationEventReceiver,
}

fn harness(delay: Duration) -> Harness {
    let locks = Arc::new(LockManager::new(LockConfig::default()));
    let memory = Arc::new(InMemoryStore::new());
    let store = Arc::new(SlowStore::new(memory.clone(), delay));
    let invalidator = Arc::new(RecordingInvalidator::default());
    let (tx, rx) = notification_channel();
    let service = RegistrationService::new(
        locks.clone(),
        store.clone(),
        coordinator(&invalidator),
        tx,
    );
    Harness {
        service: Arc::new(service),
        locks,
        memory,
        store,
        invalidator,
        notifications: rx,
    }
}

fn signup(role: RoleRef) -> RoleSignup {
    let user_id = Uuid::now_v7();
    RoleSignup {
        role,
        user_id,
        email: format!("{user_id}@example.com"),
        notes: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_remaining_slots_succeed() {
    let mut h = harness(Duration::from_millis(5));
    let role = event_role(3, false);
    let role_ref = role.role_ref();
    h.memory.add_event_role(role);

    let attempts = (0..5).map(|_| {
        let service = h.service.clone();
        tokio::spawn(async move { service.process(signup(role_ref)).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(RegistrationError::CapacityExceeded { .. })))
        .count();
    assert_eq!(succeeded, 3);
    assert_eq!(rejected, 2);
    assert_eq!(h.memory.active_registrations(role_ref).len(), 3);
    assert_eq!(drain(&mut h.notifications).len(), 3);
    assert_eq!(h.locks.stats().active_locks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_prior_occupancy_counts() {
    let h = harness(Duration::from_millis(2));
    let role = event_role(4, false);
    let role_ref = role.role_ref();
    h.memory.add_event_role(role);
    h.service.process(signup(role_ref)).await.unwrap();
    h.service.process(signup(role_ref)).await.unwrap();

    let attempts = (0..6).map(|_| {
        let service = h.service.clone();
        tokio::spawn(async move { service.process(signup(role_ref)).await })
    });
    let succeeded = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(succeeded, 2);
    assert_eq!(h.memory.active_registrations(role_ref).len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_call_sites_share_one_role_key() {
    let h = harness(Duration::from_millis(5));
    let role = event_role(2, true);
    let role_ref = role.role_ref();
    h.memory.add_event_role(role);

    let invitation = h
        .service
        .process(InviteGuest {
            role: role_ref,
            name: "Invited".into(),
            email: "invited@example.com".into(),
            phone: None,
        })
        .await
        .unwrap();

    let s1 = h.service.clone();
    let s2 = h.service.clone();
    let s3 = h.service.clone();
    let s4 = h.service.clone();
    let token = invitation.token.clone();
    let (a, b, c, d) = tokio::join!(
        tokio::spawn(async move { s1.process(signup(role_ref)).await.map(|r| r.id) }),
        tokio::spawn(async move {
            s2.process(GuestSelfRegistration {
                role: role_ref,
                name: "Self".into(),
                email: "self@example.com".into(),
                phone: None,
                notes: None,
            })
            .await
            .map(|r| r.id)
        }),
        tokio::spawn(async move {
            s3.process(PublicRegistration {
                role: role_ref,
                name: "Visitor".into(),
                email: "visitor@example.com".into(),
                phone: None,
                notes: None,
            })
            .await
            .map(|r| r.id)
        }),
        tokio::spawn(async move { s4.process(AcceptInvitation { token }).await.map(|r| r.id) }),
    );
    let results = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 2);
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => matches!(e, RegistrationError::CapacityExceeded { .. }),
    }));
    assert_eq!(h.memory.active_registrations(role_ref).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_guest_gets_one_role_per_event_under_contention() {
    let mut h = harness(Duration::from_millis(5));
    let first = event_role(5, false);
    let first_ref = first.role_ref();
    let second_ref = RoleRef::new(first_ref.event_id, Uuid::now_v7());
    h.memory.add_event_role(first);
    h.memory.add_event_role(EventRole {
        event_id: second_ref.event_id,
        role_id: second_ref.role_id,
        name: "Greeter".into(),
        max_participants: 5,
        open_to_public: false,
    });

    let attempts = [
        (first_ref, "ann@example.com"),
        (second_ref, " Ann@Example.com"),
        (first_ref, "ANN@example.com "),
        (second_ref, "ann@example.com"),
    ]
    .map(|(role, email)| {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .process(GuestSelfRegistration {
                    role,
                    name: "Ann".into(),
                    email: email.into(),
                    phone: None,
                    notes: None,
                })
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(RegistrationError::DuplicateRegistration { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(duplicates, 3);

    let total = h.memory.active_registrations(first_ref).len()
        + h.memory.active_registrations(second_ref).len();
    assert_eq!(total, 1);
    assert_eq!(drain(&mut h.notifications).len(), 1);
    assert_eq!(h.locks.stats().active_locks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_different_roles_run_in_parallel() {
    let h = harness(Duration::from_millis(50));
    let first = event_role(5, false);
    let second = event_role(5, false);
    let (first_ref, second_ref) = (first.role_ref(), second.role_ref());
    h.memory.add_event_role(first);
    h.memory.add_event_role(second);

    let single = Instant::now();
    h.service.process(signup(first_ref)).await.unwrap();
    let one = single.elapsed();

    let started = Instant::now();
    let (a, b) = tokio::join!(
        h.service.process(signup(first_ref)),
        h.service.process(signup(second_ref)),
    );
    a.unwrap();
    b.unwrap();
    assert!(started.elapsed() < one * 2);

    let started = Instant::now();
    let (a, b) = tokio::join!(
        h.service.process(signup(first_ref)),
        h.service.process(signup(first_ref)),
    );
    a.unwrap();
    b.unwrap();
    assert!(started.elapsed() >= one * 2);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_releases_lock_and_commits_nothing() {
    let mut h = harness(Duration::from_millis(1));
    let role = event_role(2, false);
    let role_ref = role.role_ref();
    h.memory.add_event_role(role);

    h.store.fail_inserts.store(true, Ordering::SeqCst);
    let err = h.service.process(signup(role_ref)).await.unwrap_err();
    assert!(matches!(err, RegistrationError::OperationFailure(_)));
    assert!(h.memory.active_registrations(role_ref).is_empty());
    assert!(h.invalidator.calls.lock().unwrap().is_empty());
    assert!(drain(&mut h.notifications).is_empty());
    assert!(!h.locks.is_locked(&LockKey::RoleSignup(role_ref).to_string()));

    h.store.fail_inserts.store(false, Ordering::SeqCst);
    h.service.process(signup(role_ref)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_failure_does_not_fail_signup() {
    let h = harness(Duration::from_millis(1));
    let role = event_role(2, false);
    let role_ref = role.role_ref();
    h.memory.add_event_role(role);

    h.invalidator.fail.store(true, Ordering::SeqCst);
    h.service.process(signup(role_ref)).await.unwrap();

    let calls = h.invalidator.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&CacheTag::RoleAvailability(role_ref)));
    assert_eq!(h.memory.active_registrations(role_ref).len(), 1);
}
