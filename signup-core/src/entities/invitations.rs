use crate::entities::RoleRef;
use crate::entities::registrations::normalize_email;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rand::{Rng, distr::Alphanumeric};
use signup_sdk::objects::registration::{
    InvitationResponse, InvitationStatus as SdkInvitationStatus,
};
use uuid::Uuid;

/// Length of the random token mailed to an invited guest.
const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "invitation_status")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl From<InvitationStatus> for SdkInvitationStatus {
    fn from(value: InvitationStatus) -> Self {
        match value {
            InvitationStatus::Pending => SdkInvitationStatus::Pending,
            InvitationStatus::Accepted => SdkInvitationStatus::Accepted,
            InvitationStatus::Declined => SdkInvitationStatus::Declined,
        }
    }
}

/// An organizer's invitation for a guest to take a specific role.
///
/// A pending invitation does not occupy a slot; the slot is claimed only
/// when the guest accepts.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GuestInvitation {
    pub id: Uuid,
    pub token: String,
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: InvitationStatus,
    pub created_at: time::PrimitiveDateTime,
}

impl GuestInvitation {
    /// Build a fresh pending invitation with a random token.
    pub fn new(role: RoleRef, name: String, email: String, phone: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            token: generate_token(),
            event_id: role.event_id,
            role_id: role.role_id,
            name,
            email: normalize_email(&email),
            phone,
            status: InvitationStatus::Pending,
            created_at: crate::entities::utc_now(),
        }
    }

    pub fn role_ref(&self) -> RoleRef {
        RoleRef::new(self.event_id, self.role_id)
    }

    pub fn to_response(&self) -> InvitationResponse {
        InvitationResponse {
            invitation_id: self.id,
            token: self.token.clone(),
            event_id: self.event_id,
            role_id: self.role_id,
            email: self.email.clone(),
            status: self.status.into(),
        }
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct GetInvitationByToken {
    pub token: String,
}

impl Processor<GetInvitationByToken> for DatabaseProcessor {
    type Output = Option<GuestInvitation>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetInvitationByToken")]
    async fn process(
        &self,
        query: GetInvitationByToken,
    ) -> Result<Option<GuestInvitation>, sqlx::Error> {
        sqlx::query_as::<_, GuestInvitation>(
            r#"
            SELECT id, token, event_id, role_id, name, email, phone, status, created_at
            FROM guest_invitations
            WHERE token = $1
            "#,
        )
        .bind(query.token)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct InsertInvitation {
    pub invitation: GuestInvitation,
}

impl Processor<InsertInvitation> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertInvitation")]
    async fn process(&self, insert: InsertInvitation) -> Result<(), sqlx::Error> {
        let i = insert.invitation;
        sqlx::query(
            r#"
            INSERT INTO guest_invitations
                (id, token, event_id, role_id, name, email, phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(i.id)
        .bind(i.token)
        .bind(i.event_id)
        .bind(i.role_id)
        .bind(i.name)
        .bind(i.email)
        .bind(i.phone)
        .bind(i.status)
        .bind(i.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_invitation_is_pending_with_random_token() {
        let role = RoleRef::new(Uuid::now_v7(), Uuid::now_v7());
        let a = GuestInvitation::new(role, "Ann".into(), "ann@example.com".into(), None);
        let b = GuestInvitation::new(role, "Ann".into(), "ann@example.com".into(), None);

        assert_eq!(a.status, InvitationStatus::Pending);
        assert_eq!(a.role_ref(), role);
        assert_eq!(a.token.len(), TOKEN_LENGTH);
        assert!(a.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.token, b.token);
    }
}
