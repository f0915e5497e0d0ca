//! Cache invalidation port.
//!
//! Writers name the views they made stale as [`CacheTag`]s. Invalidation is
//! best-effort: [`InvalidationCoordinator`] logs failures and never turns
//! them into a failed write.

pub mod view_cache;

use crate::entities::RoleRef;
use async_trait::async_trait;
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub use view_cache::ViewCache;

/// A group of cached views that go stale together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    RoleAvailability(RoleRef),
    Event(Uuid),
    /// Event listings.
    Events,
    SignupAnalytics,
    Purchase(Uuid),
    Program(Uuid),
    ProgramAnalytics,
}

impl std::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTag::RoleAvailability(role) => {
                write!(f, "role-availability:{}:{}", role.event_id, role.role_id)
            }
            CacheTag::Event(event_id) => write!(f, "event:{event_id}"),
            CacheTag::Events => write!(f, "events"),
            CacheTag::SignupAnalytics => write!(f, "analytics:signups"),
            CacheTag::Purchase(purchase_id) => write!(f, "purchase:{purchase_id}"),
            CacheTag::Program(program_id) => write!(f, "program:{program_id}"),
            CacheTag::ProgramAnalytics => write!(f, "analytics:programs"),
        }
    }
}

pub type TagList = SmallVec<[CacheTag; 4]>;

/// Views affected when a role's occupancy changes.
pub fn registration_tags(role: RoleRef) -> TagList {
    smallvec![
        CacheTag::RoleAvailability(role),
        CacheTag::Event(role.event_id),
        CacheTag::Events,
        CacheTag::SignupAnalytics,
    ]
}

/// Views affected when a purchase changes status.
pub fn purchase_tags(purchase_id: Uuid, program_id: Uuid) -> TagList {
    smallvec![
        CacheTag::Purchase(purchase_id),
        CacheTag::Program(program_id),
        CacheTag::ProgramAnalytics,
    ]
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, tags: &[CacheTag]) -> Result<(), CacheError>;
}

/// Applies the best-effort policy on top of any [`CacheInvalidator`].
#[derive(Clone)]
pub struct InvalidationCoordinator {
    inner: Arc<dyn CacheInvalidator>,
}

impl InvalidationCoordinator {
    pub fn new(inner: Arc<dyn CacheInvalidator>) -> Self {
        Self { inner }
    }

    /// Invalidate `tags`. Failures are logged and swallowed; stale views
    /// recover on their next rebuild.
    pub async fn invalidate(&self, tags: &[CacheTag]) {
        match self.inner.invalidate(tags).await {
            Ok(()) => debug!(count = tags.len(), "Invalidated cache tags"),
            Err(e) => {
                let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
                warn!(error = %e, ?tags, "Cache invalidation failed");
            }
        }
    }
}
