use super::{RegistrationError, RegistrationService};
use crate::entities::RoleRef;
use crate::locking::KeyedLock;
use kanau::processor::Processor;
use signup_sdk::objects::registration::RoleAvailabilityResponse;

/// Read a role's occupancy without taking its lock. The result may be
/// stale by the time it is returned.
#[derive(Debug, Clone)]
pub struct GetRoleAvailability {
    pub role: RoleRef,
}

impl<L: KeyedLock> Processor<GetRoleAvailability> for RegistrationService<L> {
    type Output = RoleAvailabilityResponse;
    type Error = RegistrationError;

    async fn process(
        &self,
        query: GetRoleAvailability,
    ) -> Result<RoleAvailabilityResponse, RegistrationError> {
        let role = self
            .store
            .get_event_role(query.role)
            .await?
            .ok_or(RegistrationError::RoleNotFound(query.role))?;
        let current_count = self.store.count_active_registrations(query.role).await?;
        Ok(RoleAvailabilityResponse {
            event_id: role.event_id,
            role_id: role.role_id,
            name: role.name,
            max_participants: role.max_participants,
            current_count,
            available: role.max_participants.saturating_sub(current_count),
            open_to_public: role.open_to_public,
        })
    }
}
