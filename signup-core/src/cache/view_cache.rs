//! In-process cache of JSON views, evicted by tag.

use super::{CacheError, CacheInvalidator, CacheTag, TagList};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct CachedView {
    value: serde_json::Value,
    tags: TagList,
}

#[derive(Default)]
struct CacheState {
    views: HashMap<String, CachedView>,
    /// Bumped on every invalidation.
    epoch: u64,
}

/// Read-through cache for views that may be slightly stale.
///
/// A reader takes [`ViewCache::epoch`] before computing a view and passes it
/// to [`ViewCache::insert`]. If any invalidation happened in between, the
/// insert is dropped so a view computed from old data cannot outlive the
/// invalidation that should have evicted it.
#[derive(Default)]
pub struct ViewCache {
    state: Mutex<CacheState>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.state();
        let view = state.views.get(key)?;
        serde_json::from_value(view.value.clone()).ok()
    }

    /// Store a view computed after `observed_epoch`. Returns whether it was
    /// kept.
    pub fn insert<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        tags: TagList,
        observed_epoch: u64,
    ) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "View not cacheable");
                return false;
            }
        };
        let mut state = self.state();
        if state.epoch != observed_epoch {
            return false;
        }
        state.views.insert(key.into(), CachedView { value, tags });
        true
    }

    pub fn len(&self) -> usize {
        self.state().views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every view carrying any of `tags`. Returns how many were dropped.
    pub fn evict(&self, tags: &[CacheTag]) -> usize {
        let mut state = self.state();
        state.epoch = state.epoch.wrapping_add(1);
        let before = state.views.len();
        state
            .views
            .retain(|_, view| !view.tags.iter().any(|t| tags.contains(t)));
        before - state.views.len()
    }
}

#[async_trait]
impl CacheInvalidator for ViewCache {
    async fn invalidate(&self, tags: &[CacheTag]) -> Result<(), CacheError> {
        let evicted = self.evict(tags);
        debug!(evicted, "Evicted cached views");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::registration_tags;
    use crate::entities::RoleRef;
    use smallvec::smallvec;
    use uuid::Uuid;

    #[test]
    fn test_evict_by_tag() {
        let cache = ViewCache::new();
        let role_a = RoleRef::new(Uuid::now_v7(), Uuid::now_v7());
        let role_b = RoleRef::new(Uuid::now_v7(), Uuid::now_v7());

        let epoch = cache.epoch();
        assert!(cache.insert("a", &1u32, registration_tags(role_a), epoch));
        assert!(cache.insert("b", &2u32, smallvec![CacheTag::RoleAvailability(role_b)], epoch));

        assert_eq!(cache.evict(&[CacheTag::RoleAvailability(role_a)]), 1);
        assert_eq!(cache.get::<u32>("a"), None);
        assert_eq!(cache.get::<u32>("b"), Some(2));
    }

    #[test]
    fn test_insert_after_invalidation_is_dropped() {
        let cache = ViewCache::new();
        let epoch = cache.epoch();
        cache.evict(&[CacheTag::Events]);

        assert!(!cache.insert("stale", &"old", smallvec![CacheTag::Events], epoch));
        assert!(cache.is_empty());
    }
}
