use chrono::{DateTime, Utc};
use common_types::{FlagId, OrganizationId};
use serde::{Deserialize, Serialize};

use crate::flags::{Flag, FlagScope};

/// The value a flag resolves to for one viewer: the viewer's override when
/// present, the default otherwise. Values are opaque typed strings; nothing
/// here coerces them against the flag's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveValue {
    pub value: String,
    pub is_overridden: bool,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Toggled,
}

/// Scope tag on the wire: the string `"personal"` or
/// `{"organizationId": "<uuid>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventScope {
    #[serde(rename = "personal")]
    Personal,
    #[serde(rename = "organizationId")]
    Organization(OrganizationId),
}

impl From<&FlagScope> for EventScope {
    fn from(scope: &FlagScope) -> Self {
        match scope {
            FlagScope::Personal { .. } => EventScope::Personal,
            FlagScope::Organization { organization_id } => {
                EventScope::Organization(*organization_id)
            }
        }
    }
}

/// Ephemeral notification published to live subscribers at the moment of a
/// mutation. Never persisted; a subscriber that connects later pulls current
/// state through the resolver instead of replaying a backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub flag_id: FlagId,
    pub key: String,
    pub value: String,
    pub is_overridden: bool,
    pub scope: EventScope,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Event for a flag-level mutation; carries the default value.
    pub fn for_flag(kind: EventKind, flag: &Flag) -> Self {
        ChangeEvent {
            kind,
            flag_id: flag.id,
            key: flag.key.clone(),
            value: flag.default_value.clone(),
            is_overridden: false,
            scope: EventScope::from(&flag.scope),
            timestamp: Utc::now(),
        }
    }

    /// Event for an override write; carries the override value the target
    /// user now resolves to.
    pub fn for_override(flag: &Flag, value: &str) -> Self {
        ChangeEvent {
            kind: EventKind::Updated,
            flag_id: flag.id,
            key: flag.key.clone(),
            value: value.to_string(),
            is_overridden: true,
            scope: EventScope::from(&flag.scope),
            timestamp: Utc::now(),
        }
    }

    /// Event for an override removal; the target user falls back to the
    /// default value.
    pub fn for_override_removed(flag: &Flag) -> Self {
        ChangeEvent {
            kind: EventKind::Updated,
            flag_id: flag.id,
            key: flag.key.clone(),
            value: flag.default_value.clone(),
            is_overridden: false,
            scope: EventScope::from(&flag.scope),
            timestamp: Utc::now(),
        }
    }

    /// JSON wire form handed to transports. The contract serializes
    /// infallibly, so a failure degrades to an empty payload rather than
    /// taking the stream down.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
