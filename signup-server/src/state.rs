//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use signup_core::cache::{CacheInvalidator, InvalidationCoordinator, ViewCache};
use signup_core::config::LockConfig;
use signup_core::events::NotificationEventSender;
use signup_core::locking::LockManager;
use signup_core::payments::{CheckoutGateway, PaymentService};
use signup_core::registration::RegistrationService;
use signup_core::store::{PurchaseStore, RegistrationStore};
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (reloadable sections are swapped on SIGHUP).
    pub config: SharedConfig,
    /// The process-wide lock table. Both services serialize through it.
    pub locks: Arc<LockManager>,
    pub registrations: Arc<RegistrationService>,
    pub payments: Arc<PaymentService>,
    /// Read-through cache for availability views.
    pub views: Arc<ViewCache>,
}

impl AppState {
    /// Wire both services over one store, one lock manager and one view cache.
    pub fn new<S>(
        config: SharedConfig,
        lock_config: LockConfig,
        store: Arc<S>,
        gateway: Arc<dyn CheckoutGateway>,
        notifications: NotificationEventSender,
    ) -> Self
    where
        S: RegistrationStore + PurchaseStore + 'static,
    {
        let locks = Arc::new(LockManager::new(lock_config));
        let views = Arc::new(ViewCache::new());
        let coordinator =
            InvalidationCoordinator::new(Arc::clone(&views) as Arc<dyn CacheInvalidator>);

        let registrations = RegistrationService::new(
            Arc::clone(&locks),
            Arc::clone(&store) as Arc<dyn RegistrationStore>,
            coordinator.clone(),
            notifications.clone(),
        );
        let payments = PaymentService::new(
            Arc::clone(&locks),
            store as Arc<dyn PurchaseStore>,
            gateway,
            coordinator,
            notifications,
        );

        Self {
            config,
            locks,
            registrations: Arc::new(registrations),
            payments: Arc::new(payments),
            views,
        }
    }
}
