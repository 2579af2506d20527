use serde::Serialize;

use crate::models::UserRole;

/// Areas of the workshop a request can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Dashboard,
    Projects,
    Technicians,
    Finance,
    Inventory,
    Schedule,
    TimeTracking,
    Reports,
    Settings,
    MyTasks,
    /// The customer-facing project page: read-only view, messages and approval decisions.
    ClientPortal,
}

impl Resource {
    pub const ALL: [Self; 11] = [
        Self::Dashboard,
        Self::Projects,
        Self::Technicians,
        Self::Finance,
        Self::Inventory,
        Self::Schedule,
        Self::TimeTracking,
        Self::Reports,
        Self::Settings,
        Self::MyTasks,
        Self::ClientPortal,
    ];
}

pub fn can_view(role: UserRole, resource: Resource) -> bool {
    match role {
        UserRole::Boss => true,
        UserRole::Manager => !matches!(
            resource,
            Resource::Finance | Resource::Reports | Resource::Settings
        ),
        UserRole::Technician => matches!(resource, Resource::MyTasks | Resource::TimeTracking),
        UserRole::Client => resource == Resource::ClientPortal,
    }
}

pub fn capabilities(role: UserRole) -> Vec<Resource> {
    Resource::ALL
        .into_iter()
        .filter(|resource| can_view(role, *resource))
        .collect()
}
