use chrono::{DateTime, Utc};
use common_types::{FlagId, OrganizationId, OverrideId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared value type of a flag. This is a label for consumers; stored
/// values stay opaque text and are not checked against it at resolve time.
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
pub enum FlagType {
    Boolean,
    String,
    Number,
    Json,
}

/// Where a flag lives. Keys are unique within one scope, never across scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagScope {
    Personal { owner: UserId },
    Organization { organization_id: OrganizationId },
}

impl FlagScope {
    pub fn organization_id(&self) -> Option<OrganizationId> {
        match self {
            FlagScope::Personal { .. } => None,
            FlagScope::Organization { organization_id } => Some(*organization_id),
        }
    }

    pub fn is_personal(&self) -> bool {
        matches!(self, FlagScope::Personal { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    pub key: String,
    pub flag_type: FlagType,
    /// Stored as text, tagged by `flag_type`; interpretation is the caller's.
    pub default_value: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope: FlagScope,
    #[serde(default)]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flag {
    pub fn owner(&self) -> Option<UserId> {
        match self.scope {
            FlagScope::Personal { owner } => Some(owner),
            FlagScope::Organization { .. } => None,
        }
    }
}

/// Draft for `FlagService::create_flag`. Id and timestamps are assigned at
/// persist time; new flags start enabled.
#[derive(Debug, Clone)]
pub struct NewFlag {
    pub key: String,
    pub flag_type: FlagType,
    pub default_value: String,
    pub description: Option<String>,
    pub scope: FlagScope,
}

impl NewFlag {
    pub(crate) fn into_flag(self, now: DateTime<Utc>) -> Flag {
        Flag {
            id: Uuid::new_v4(),
            key: self.key,
            flag_type: self.flag_type,
            default_value: self.default_value,
            description: self.description,
            scope: self.scope,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `FlagService::update_flag`. `None` fields are left
/// untouched; the enabled bit is flipped through `toggle_flag` instead.
#[derive(Debug, Clone, Default)]
pub struct FlagPatch {
    pub key: Option<String>,
    pub description: Option<String>,
    pub default_value: Option<String>,
}

impl FlagPatch {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.description.is_none() && self.default_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagOverride {
    pub id: OverrideId,
    pub flag_id: FlagId,
    pub user_id: UserId,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
