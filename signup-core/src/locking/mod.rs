//! Keyed mutual exclusion for capacity-constrained writes.

pub mod key;
pub mod manager;

pub use key::LockKey;
pub use manager::{ClearLocksForbidden, KeyedLock, LockManager, LockStats, LockTimeout};
