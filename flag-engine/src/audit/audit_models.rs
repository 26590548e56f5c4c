use chrono::{DateTime, Utc};
use common_types::{FlagId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditKind {
    Created,
    Updated,
    Deleted,
    Toggled,
    OverrideCreated,
    OverrideDeleted,
}

/// One immutable line of the audit trail. Records are never updated or
/// deleted once written, and they outlive the flag they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub flag_id: FlagId,
    pub actor: UserId,
    pub kind: AuditKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
