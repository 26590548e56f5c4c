mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use common_types::{FlagId, OrganizationId, OverrideId, UserId};
use thiserror::Error;

use crate::audit::AuditRecord;
use crate::flags::{Flag, FlagOverride, FlagScope};
use crate::memberships::Membership;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation timed out")]
    Timeout,
}

pub type SharedFlagStore = Arc<dyn FlagStore + Send + Sync>;
pub type SharedOverrideStore = Arc<dyn OverrideStore + Send + Sync>;
pub type SharedMembershipStore = Arc<dyn MembershipStore + Send + Sync>;
pub type SharedAuditStore = Arc<dyn AuditStore + Send + Sync>;

/// Flag rows, keyed by id and unique on (scope, key).
///
/// Durable backends are expected to wrap a mutation and its audit append in
/// one transaction; this crate only sequences the calls and treats a failure
/// of either as a failure of the whole mutation.
#[async_trait]
pub trait FlagStore {
    async fn insert_flag(&self, flag: &Flag) -> Result<(), StoreError>;

    async fn flag_by_id(&self, id: FlagId) -> Result<Option<Flag>, StoreError>;

    /// Key lookup within one scope. Keys are never unique across scopes.
    async fn flag_by_key(&self, scope: &FlagScope, key: &str) -> Result<Option<Flag>, StoreError>;

    async fn update_flag(&self, flag: &Flag) -> Result<(), StoreError>;

    /// Returns false when the id was already gone.
    async fn delete_flag(&self, id: FlagId) -> Result<bool, StoreError>;

    async fn flags_for_scope(&self, scope: &FlagScope) -> Result<Vec<Flag>, StoreError>;
}

/// Per-user replacement values, at most one row per (flag, user).
#[async_trait]
pub trait OverrideStore {
    /// Replace-on-conflict write: if a row for (flag_id, user_id) exists its
    /// id is kept and only value/updated_at change. Returns the stored row.
    async fn upsert_override(&self, candidate: FlagOverride) -> Result<FlagOverride, StoreError>;

    async fn override_by_id(&self, id: OverrideId) -> Result<Option<FlagOverride>, StoreError>;

    async fn override_for(
        &self,
        flag_id: FlagId,
        user_id: UserId,
    ) -> Result<Option<FlagOverride>, StoreError>;

    async fn overrides_for_user(&self, user_id: UserId) -> Result<Vec<FlagOverride>, StoreError>;

    async fn delete_override(&self, id: OverrideId) -> Result<bool, StoreError>;

    /// Cascade helper for flag deletion; returns the number of rows removed.
    async fn delete_overrides_for_flag(&self, flag_id: FlagId) -> Result<u64, StoreError>;
}

/// (organization, user, role) rows, unique per (organization, user).
#[async_trait]
pub trait MembershipStore {
    async fn membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>, StoreError>;

    async fn memberships_for_org(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, StoreError>;

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError>;

    async fn delete_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;
}

/// Append-only audit rows. Backends never update or delete existing rows.
#[async_trait]
pub trait AuditStore {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// History for one flag, newest first.
    async fn audit_for_flag(&self, flag_id: FlagId) -> Result<Vec<AuditRecord>, StoreError>;
}
