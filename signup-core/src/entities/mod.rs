//! Domain records and their PostgreSQL commands.
//!
//! Each module defines the record type, its `sqlx::Type` enums (with
//! conversions to the API versions in `signup_sdk::objects`) and one
//! command struct per query, executed through
//! `impl Processor<Command> for DatabaseProcessor`.

pub mod event_roles;
pub mod invitations;
pub mod programs;
pub mod purchases;
pub mod registrations;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to one capacity-constrained event role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub event_id: Uuid,
    pub role_id: Uuid,
}

impl RoleRef {
    pub fn new(event_id: Uuid, role_id: Uuid) -> Self {
        Self { event_id, role_id }
    }
}

impl std::fmt::Display for RoleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.event_id, self.role_id)
    }
}

/// Current UTC time without offset, as stored in `TIMESTAMP` columns.
pub(crate) fn utc_now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

/// Saturating conversion for `COUNT(*)` results.
pub(crate) fn count_to_u32(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}
