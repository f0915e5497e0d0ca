use sqlx::PgPool;

/// PostgreSQL-backed processor. Every storage command in
/// [`crate::entities`] is a `Processor<Command>` impl on this type.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A business rule refused the request. Retrying will not help.
    Rejected,
    /// The referenced record does not exist (yet).
    NotFound,
    /// Transient contention. Retry with backoff.
    Retryable,
    /// Storage or infrastructure failure.
    Internal,
}
