//! Registration request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /events/{event_id}/roles/{role_id}/signup`.
///
/// Identity is supplied by the authentication layer in front of this
/// service; it is forwarded here verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSignupRequest {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of the guest self-registration and public registration endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestSignupRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Where a registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationSource {
    RoleSignup,
    GuestSelfRegistration,
    GuestInvitation,
    PublicRegistration,
}

/// Registration status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Active => write!(f, "active"),
            RegistrationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub email: String,
    pub source: RegistrationSource,
    pub status: RegistrationStatus,
    pub created_at: i64,
}

/// Read-optimized availability view for one event role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAvailabilityResponse {
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub name: String,
    pub max_participants: u32,
    pub current_count: u32,
    pub available: u32,
    pub open_to_public: bool,
}

/// Body of `POST /events/{event_id}/roles/{role_id}/invitations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvitationRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub invitation_id: Uuid,
    /// Secret the guest presents to `POST /invitations/{token}/accept`.
    pub token: String,
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub email: String,
    pub status: InvitationStatus,
}
