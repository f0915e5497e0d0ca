use crate::entities::{RoleRef, count_to_u32};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use signup_sdk::objects::registration::{
    RegistrationResponse, RegistrationSource as SdkRegistrationSource,
    RegistrationStatus as SdkRegistrationStatus,
};
use uuid::Uuid;

/// Registration status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `signup_sdk::objects::registration::RegistrationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "registration_status")]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

impl From<RegistrationStatus> for SdkRegistrationStatus {
    fn from(value: RegistrationStatus) -> Self {
        match value {
            RegistrationStatus::Active => SdkRegistrationStatus::Active,
            RegistrationStatus::Cancelled => SdkRegistrationStatus::Cancelled,
        }
    }
}

/// Which of the four sign-up paths produced a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "registration_source")]
pub enum RegistrationSource {
    RoleSignup,
    GuestSelfRegistration,
    GuestInvitation,
    PublicRegistration,
}

impl From<RegistrationSource> for SdkRegistrationSource {
    fn from(value: RegistrationSource) -> Self {
        match value {
            RegistrationSource::RoleSignup => SdkRegistrationSource::RoleSignup,
            RegistrationSource::GuestSelfRegistration => {
                SdkRegistrationSource::GuestSelfRegistration
            }
            RegistrationSource::GuestInvitation => SdkRegistrationSource::GuestInvitation,
            RegistrationSource::PublicRegistration => SdkRegistrationSource::PublicRegistration,
        }
    }
}

/// The person occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    /// An authenticated account holder.
    User { user_id: Uuid, email: String },
    /// Someone without an account, identified by email.
    Guest {
        name: String,
        email: String,
        phone: Option<String>,
    },
}

impl Participant {
    pub fn email(&self) -> &str {
        match self {
            Participant::User { email, .. } | Participant::Guest { email, .. } => email,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Participant::User { .. } => None,
            Participant::Guest { name, .. } => Some(name),
        }
    }

    /// The participant as it is stored: email normalized, guest name trimmed.
    pub fn normalized(self) -> Self {
        match self {
            Participant::User { user_id, email } => Participant::User {
                user_id,
                email: normalize_email(&email),
            },
            Participant::Guest { name, email, phone } => Participant::Guest {
                name: name.trim().to_owned(),
                email: normalize_email(&email),
                phone,
            },
        }
    }

    pub fn identity(&self) -> ParticipantIdentity {
        match self {
            Participant::User { user_id, .. } => ParticipantIdentity::User(*user_id),
            Participant::Guest { email, .. } => ParticipantIdentity::Email(normalize_email(email)),
        }
    }
}

/// Key used for duplicate detection. Emails are compared trimmed and
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticipantIdentity {
    User(Uuid),
    Email(String),
}

impl std::fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantIdentity::User(user_id) => write!(f, "user {user_id}"),
            ParticipantIdentity::Email(email) => write!(f, "{email}"),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// How far a duplicate check looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniquenessScope {
    /// The same identity may not hold this role twice.
    Role,
    /// The same identity may hold at most one role of the event.
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: Uuid,
    pub role: RoleRef,
    pub participant: Participant,
    pub source: RegistrationSource,
    pub status: RegistrationStatus,
    pub notes: Option<String>,
    /// Set when the registration came from accepting a guest invitation.
    pub invitation_id: Option<Uuid>,
    pub created_at: time::PrimitiveDateTime,
}

impl Registration {
    pub fn is_active(&self) -> bool {
        self.status == RegistrationStatus::Active
    }

    pub fn matches(&self, identity: &ParticipantIdentity) -> bool {
        match (identity, &self.participant) {
            (ParticipantIdentity::User(id), Participant::User { user_id, .. }) => id == user_id,
            (ParticipantIdentity::Email(email), participant) => {
                normalize_email(participant.email()) == *email
            }
            (ParticipantIdentity::User(_), Participant::Guest { .. }) => false,
        }
    }

    pub fn to_response(&self) -> RegistrationResponse {
        RegistrationResponse {
            registration_id: self.id,
            event_id: self.role.event_id,
            role_id: self.role.role_id,
            email: self.participant.email().to_owned(),
            source: self.source.into(),
            status: self.status.into(),
            created_at: self.created_at.assume_utc().unix_timestamp(),
        }
    }
}

/// Flat row shape of the `registrations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    event_id: Uuid,
    role_id: Uuid,
    user_id: Option<Uuid>,
    email: String,
    name: Option<String>,
    phone: Option<String>,
    notes: Option<String>,
    source: RegistrationSource,
    status: RegistrationStatus,
    invitation_id: Option<Uuid>,
    created_at: time::PrimitiveDateTime,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        let participant = match row.user_id {
            Some(user_id) => Participant::User {
                user_id,
                email: row.email,
            },
            None => Participant::Guest {
                name: row.name.unwrap_or_default(),
                email: row.email,
                phone: row.phone,
            },
        };
        Self {
            id: row.id,
            role: RoleRef::new(row.event_id, row.role_id),
            participant,
            source: row.source,
            status: row.status,
            notes: row.notes,
            invitation_id: row.invitation_id,
            created_at: row.created_at,
        }
    }
}

const REGISTRATION_COLUMNS: &str = "id, event_id, role_id, user_id, email, name, phone, notes, \
     source, status, invitation_id, created_at";

#[derive(Debug, Clone)]
/// Count active registrations for one role.
pub struct CountActiveRegistrations {
    pub role: RoleRef,
}

impl Processor<CountActiveRegistrations> for DatabaseProcessor {
    type Output = u32;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountActiveRegistrations")]
    async fn process(&self, query: CountActiveRegistrations) -> Result<u32, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM registrations
            WHERE event_id = $1 AND role_id = $2 AND status = 'active'
            "#,
        )
        .bind(query.role.event_id)
        .bind(query.role.role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count_to_u32(count))
    }
}

#[derive(Debug, Clone)]
/// Find an active registration of the same participant, either on this
/// role or anywhere on the event depending on `scope`.
pub struct FindActiveRegistration {
    pub role: RoleRef,
    pub identity: ParticipantIdentity,
    pub scope: UniquenessScope,
}

impl Processor<FindActiveRegistration> for DatabaseProcessor {
    type Output = Option<Registration>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindActiveRegistration")]
    async fn process(
        &self,
        query: FindActiveRegistration,
    ) -> Result<Option<Registration>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE status = 'active' AND event_id = "
        ));
        builder.push_bind(query.role.event_id);
        if query.scope == UniquenessScope::Role {
            builder.push(" AND role_id = ").push_bind(query.role.role_id);
        }
        match query.identity {
            ParticipantIdentity::User(user_id) => {
                builder.push(" AND user_id = ").push_bind(user_id);
            }
            ParticipantIdentity::Email(email) => {
                builder.push(" AND lower(trim(email)) = ").push_bind(email);
            }
        }
        builder.push(" LIMIT 1");

        let row = builder
            .build_query_as::<RegistrationRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Registration::from))
    }
}

#[derive(Debug, Clone)]
pub struct GetRegistrationById {
    pub registration_id: Uuid,
}

impl Processor<GetRegistrationById> for DatabaseProcessor {
    type Output = Option<Registration>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRegistrationById")]
    async fn process(&self, query: GetRegistrationById) -> Result<Option<Registration>, sqlx::Error> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(query.registration_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Registration::from))
    }
}

#[derive(Debug, Clone)]
/// Insert a registration. When it came from an invitation, the invitation
/// is marked accepted in the same transaction.
pub struct InsertRegistration {
    pub registration: Registration,
}

impl Processor<InsertRegistration> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertRegistration")]
    async fn process(&self, insert: InsertRegistration) -> Result<(), sqlx::Error> {
        let r = insert.registration;
        let (user_id, name, phone) = match &r.participant {
            Participant::User { user_id, .. } => (Some(*user_id), None, None),
            Participant::Guest { name, phone, .. } => (None, Some(name.clone()), phone.clone()),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO registrations
                (id, event_id, role_id, user_id, email, name, phone, notes,
                 source, status, invitation_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(r.id)
        .bind(r.role.event_id)
        .bind(r.role.role_id)
        .bind(user_id)
        .bind(r.participant.email())
        .bind(name)
        .bind(phone)
        .bind(&r.notes)
        .bind(r.source)
        .bind(r.status)
        .bind(r.invitation_id)
        .bind(r.created_at)
        .execute(&mut *tx)
        .await?;

        if let Some(invitation_id) = r.invitation_id {
            sqlx::query(
                r#"
                UPDATE guest_invitations
                SET status = 'accepted', responded_at = NOW()
                WHERE id = $1 AND status = 'pending'
                "#,
            )
            .bind(invitation_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Mark an active registration cancelled. Returns whether a row changed.
pub struct CancelRegistration {
    pub registration_id: Uuid,
}

impl Processor<CancelRegistration> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CancelRegistration")]
    async fn process(&self, update: CancelRegistration) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'cancelled', cancelled_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(update.registration_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
