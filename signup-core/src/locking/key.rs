use crate::entities::RoleRef;
use uuid::Uuid;

/// Lock keys, rendered as `{domain}:{id}[:{sub-id}]`.
///
/// Every code path that mutates the same resource must build its key from
/// the same variant, otherwise the paths do not serialize against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Occupancy of one event role. Shared by all four sign-up paths and
    /// by cancellation.
    RoleSignup(RoleRef),
    /// One guest's sign-ups across the roles of an event. Taken before the
    /// role key whenever both are needed. `email` must already be normalized.
    GuestSignup { event_id: Uuid, email: String },
    /// Status of one checkout session.
    PaymentSession(String),
    /// The program-wide class-rep slot pool.
    ClassRepPool(Uuid),
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::RoleSignup(role) => write!(f, "signup:{}:{}", role.event_id, role.role_id),
            LockKey::GuestSignup { event_id, email } => write!(f, "guest:{event_id}:{email}"),
            LockKey::PaymentSession(session_id) => write!(f, "payment:{session_id}"),
            LockKey::ClassRepPool(program_id) => write!(f, "class-rep:{program_id}"),
        }
    }
}
