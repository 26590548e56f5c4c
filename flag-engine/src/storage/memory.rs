use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common_types::{FlagId, OrganizationId, OverrideId, UserId};
use tokio::sync::RwLock;

use crate::audit::AuditRecord;
use crate::flags::{Flag, FlagOverride, FlagScope};
use crate::memberships::Membership;
use crate::storage::{
    AuditStore, FlagStore, MembershipStore, OverrideStore, StoreError,
};

/// In-memory implementation of every store trait, for tests and embedded
/// callers. Audit rows are kept in append order, so reading them back in
/// reverse yields newest-first without a sort.
#[derive(Default)]
pub struct MemoryStore {
    flags: RwLock<HashMap<FlagId, Flag>>,
    overrides: RwLock<HashMap<OverrideId, FlagOverride>>,
    memberships: RwLock<HashMap<(OrganizationId, UserId), Membership>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl FlagStore for MemoryStore {
    async fn insert_flag(&self, flag: &Flag) -> Result<(), StoreError> {
        self.flags.write().await.insert(flag.id, flag.clone());
        Ok(())
    }

    async fn flag_by_id(&self, id: FlagId) -> Result<Option<Flag>, StoreError> {
        Ok(self.flags.read().await.get(&id).cloned())
    }

    async fn flag_by_key(&self, scope: &FlagScope, key: &str) -> Result<Option<Flag>, StoreError> {
        Ok(self
            .flags
            .read()
            .await
            .values()
            .find(|f| f.scope == *scope && f.key == key)
            .cloned())
    }

    async fn update_flag(&self, flag: &Flag) -> Result<(), StoreError> {
        self.flags.write().await.insert(flag.id, flag.clone());
        Ok(())
    }

    async fn delete_flag(&self, id: FlagId) -> Result<bool, StoreError> {
        Ok(self.flags.write().await.remove(&id).is_some())
    }

    async fn flags_for_scope(&self, scope: &FlagScope) -> Result<Vec<Flag>, StoreError> {
        Ok(self
            .flags
            .read()
            .await
            .values()
            .filter(|f| f.scope == *scope)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OverrideStore for MemoryStore {
    async fn upsert_override(&self, candidate: FlagOverride) -> Result<FlagOverride, StoreError> {
        let mut overrides = self.overrides.write().await;
        let existing_id = overrides
            .values()
            .find(|o| o.flag_id == candidate.flag_id && o.user_id == candidate.user_id)
            .map(|o| o.id);

        let stored = match existing_id {
            // Replace-on-conflict: the existing row keeps its id.
            Some(id) => FlagOverride {
                id,
                updated_at: Utc::now(),
                ..candidate
            },
            None => candidate,
        };
        overrides.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn override_by_id(&self, id: OverrideId) -> Result<Option<FlagOverride>, StoreError> {
        Ok(self.overrides.read().await.get(&id).cloned())
    }

    async fn override_for(
        &self,
        flag_id: FlagId,
        user_id: UserId,
    ) -> Result<Option<FlagOverride>, StoreError> {
        Ok(self
            .overrides
            .read()
            .await
            .values()
            .find(|o| o.flag_id == flag_id && o.user_id == user_id)
            .cloned())
    }

    async fn overrides_for_user(&self, user_id: UserId) -> Result<Vec<FlagOverride>, StoreError> {
        Ok(self
            .overrides
            .read()
            .await
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_override(&self, id: OverrideId) -> Result<bool, StoreError> {
        Ok(self.overrides.write().await.remove(&id).is_some())
    }

    async fn delete_overrides_for_flag(&self, flag_id: FlagId) -> Result<u64, StoreError> {
        let mut overrides = self.overrides.write().await;
        let doomed: Vec<OverrideId> = overrides
            .values()
            .filter(|o| o.flag_id == flag_id)
            .map(|o| o.id)
            .collect();
        for id in &doomed {
            overrides.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(organization_id, user_id))
            .cloned())
    }

    async fn memberships_for_org(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.memberships.write().await.insert(
            (membership.organization_id, membership.user_id),
            membership.clone(),
        );
        Ok(())
    }

    async fn delete_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .memberships
            .write()
            .await
            .remove(&(organization_id, user_id))
            .is_some())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.audit.write().await.push(record.clone());
        Ok(())
    }

    async fn audit_for_flag(&self, flag_id: FlagId) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self
            .audit
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.flag_id == flag_id)
            .cloned()
            .collect())
    }
}
