use chrono::{DateTime, Utc};
use common_types::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// One (organization, user, role) row, unique per (organization, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(organization_id: OrganizationId, user_id: UserId, role: Role) -> Self {
        Membership {
            organization_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}
