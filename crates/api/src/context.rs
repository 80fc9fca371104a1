use salondesk_auth::Role;
use salondesk_core::StaffId;

/// Authenticated staff context for a request.
///
/// Attached by the auth middleware; every mutating handler stamps its
/// commands with this identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffContext {
    staff_id: StaffId,
    roles: Vec<Role>,
}

impl StaffContext {
    pub fn new(staff_id: StaffId, roles: Vec<Role>) -> Self {
        Self { staff_id, roles }
    }

    pub fn staff_id(&self) -> StaffId {
        self.staff_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
