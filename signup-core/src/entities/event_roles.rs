use crate::entities::RoleRef;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// One sign-up role of an event with its slot limit.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventRole {
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "i64")]
    pub max_participants: u32,
    /// Whether unauthenticated visitors may register for this role.
    pub open_to_public: bool,
}

impl EventRole {
    pub fn role_ref(&self) -> RoleRef {
        RoleRef::new(self.event_id, self.role_id)
    }
}

#[derive(Debug, Clone)]
pub struct GetEventRole {
    pub role: RoleRef,
}

impl Processor<GetEventRole> for DatabaseProcessor {
    type Output = Option<EventRole>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventRole")]
    async fn process(&self, query: GetEventRole) -> Result<Option<EventRole>, sqlx::Error> {
        sqlx::query_as::<_, EventRole>(
            r#"
            SELECT event_id, role_id, name, max_participants, open_to_public
            FROM event_roles
            WHERE event_id = $1 AND role_id = $2
            "#,
        )
        .bind(query.role.event_id)
        .bind(query.role.role_id)
        .fetch_optional(&self.pool)
        .await
    }
}
