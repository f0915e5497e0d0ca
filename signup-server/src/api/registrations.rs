//! Registration handlers.
//!
//! Every sign-up path goes through [`RegistrationService`], which serializes
//! writes per role. Handlers only validate input and map results.
//!
//! [`RegistrationService`]: signup_core::registration::RegistrationService

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kanau::processor::Processor;
use signup_core::cache::{CacheTag, TagList};
use signup_core::entities::RoleRef;
use signup_core::registration::{
    AcceptInvitation, CancelSignup, GetRoleAvailability, GuestSelfRegistration, InviteGuest,
    PublicRegistration, RoleSignup,
};
use signup_sdk::objects::registration::{
    CreateInvitationRequest, GuestSignupRequest, RoleAvailabilityResponse, UserSignupRequest,
};
use uuid::Uuid;

use super::ApiError;
use super::extractors::AdminAuth;
use crate::state::AppState;

/// Build the registration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/{event_id}/roles/{role_id}/signup", post(signup))
        .route(
            "/events/{event_id}/roles/{role_id}/guest-signup",
            post(guest_signup),
        )
        .route(
            "/events/{event_id}/roles/{role_id}/public-signup",
            post(public_signup),
        )
        .route(
            "/events/{event_id}/roles/{role_id}/invitations",
            post(create_invitation),
        )
        .route(
            "/events/{event_id}/roles/{role_id}/availability",
            get(availability),
        )
        .route("/invitations/{token}/accept", post(accept_invitation))
        .route(
            "/registrations/{registration_id}/cancel",
            post(cancel_registration),
        )
}

fn validate_contact(name: &str, email: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty"));
    }
    validate_email(email)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::Validation("email is not a valid address")),
    }
}

/// `POST /events/{event_id}/roles/{role_id}/signup`: an account holder takes
/// a slot.
async fn signup(
    State(state): State<AppState>,
    Path((event_id, role_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UserSignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_email(&payload.email)?;
    let registration = state
        .registrations
        .process(RoleSignup {
            role: RoleRef::new(event_id, role_id),
            user_id: payload.user_id,
            email: payload.email,
            notes: payload.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration.to_response())))
}

/// `POST /events/{event_id}/roles/{role_id}/guest-signup`
async fn guest_signup(
    State(state): State<AppState>,
    Path((event_id, role_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<GuestSignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_contact(&payload.name, &payload.email)?;
    let registration = state
        .registrations
        .process(GuestSelfRegistration {
            role: RoleRef::new(event_id, role_id),
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            notes: payload.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration.to_response())))
}

/// `POST /events/{event_id}/roles/{role_id}/public-signup`: only for roles
/// open to the public.
async fn public_signup(
    State(state): State<AppState>,
    Path((event_id, role_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<GuestSignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_contact(&payload.name, &payload.email)?;
    let registration = state
        .registrations
        .process(PublicRegistration {
            role: RoleRef::new(event_id, role_id),
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            notes: payload.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration.to_response())))
}

/// `POST /events/{event_id}/roles/{role_id}/invitations`: an organizer
/// invites a guest. The slot is taken only on acceptance.
async fn create_invitation(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path((event_id, role_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_contact(&payload.name, &payload.email)?;
    let invitation = state
        .registrations
        .process(InviteGuest {
            role: RoleRef::new(event_id, role_id),
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(invitation.to_response())))
}

/// `POST /invitations/{token}/accept`
async fn accept_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .registrations
        .process(AcceptInvitation { token })
        .await?;
    Ok((StatusCode::CREATED, Json(registration.to_response())))
}

/// `POST /registrations/{registration_id}/cancel`: idempotent.
async fn cancel_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .registrations
        .process(CancelSignup { registration_id })
        .await?;
    Ok(Json(registration.to_response()))
}

/// `GET /events/{event_id}/roles/{role_id}/availability`
///
/// Served from the view cache. The epoch is taken before the read so a view
/// computed across a concurrent invalidation is never stored.
async fn availability(
    State(state): State<AppState>,
    Path((event_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoleAvailabilityResponse>, ApiError> {
    let role = RoleRef::new(event_id, role_id);
    let key = format!("availability:{event_id}:{role_id}");
    if let Some(view) = state.views.get::<RoleAvailabilityResponse>(&key) {
        return Ok(Json(view));
    }

    let epoch = state.views.epoch();
    let view = state
        .registrations
        .process(GetRoleAvailability { role })
        .await?;
    let tags: TagList = [CacheTag::RoleAvailability(role), CacheTag::Event(event_id)]
        .into_iter()
        .collect();
    state.views.insert(key, &view, tags, epoch);
    Ok(Json(view))
}
