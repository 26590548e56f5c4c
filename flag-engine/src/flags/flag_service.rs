use std::sync::Arc;

use chrono::Utc;
use common_types::{FlagId, OverrideId, UserId};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::api::errors::FlagError;
use crate::api::permissions::{can_create_override_for, can_mutate_flag};
use crate::api::types::{ChangeEvent, EventKind};
use crate::audit::{AuditKind, AuditTrail};
use crate::broadcast::ChangeBroadcaster;
use crate::config::Config;
use crate::flags::flag_models::{Flag, FlagOverride, FlagPatch, FlagScope, NewFlag};
use crate::memberships::MembershipIndex;
use crate::storage::{SharedFlagStore, SharedOverrideStore};

/// Coordinates every flag and override mutation.
///
/// Each operation runs authorize → validate → persist → audit → broadcast,
/// stopping at the first failed step: a denied or invalid request touches
/// nothing, and a failed persist or audit append returns an error without
/// broadcasting. Mutations against the same flag id are serialized through a
/// keyed async lock, so audit records land in the order the mutations
/// applied; mutations to different flags proceed independently. Broadcast
/// failures to individual subscribers are swallowed inside the broadcaster
/// and never affect the mutation's outcome.
pub struct FlagService {
    flags: SharedFlagStore,
    overrides: SharedOverrideStore,
    memberships: MembershipIndex,
    audit: AuditTrail,
    broadcaster: Arc<ChangeBroadcaster>,
    max_key_length: usize,
    max_value_bytes: usize,
    locks: DashMap<FlagId, Arc<Mutex<()>>>,
}

impl FlagService {
    pub fn new(
        flags: SharedFlagStore,
        overrides: SharedOverrideStore,
        memberships: MembershipIndex,
        audit: AuditTrail,
        broadcaster: Arc<ChangeBroadcaster>,
        config: &Config,
    ) -> Self {
        FlagService {
            flags,
            overrides,
            memberships,
            audit,
            broadcaster,
            max_key_length: config.max_flag_key_length,
            max_value_bytes: config.max_value_bytes,
            locks: DashMap::new(),
        }
    }

    #[instrument(skip(self, draft), fields(key = %draft.key))]
    pub async fn create_flag(&self, draft: NewFlag, actor: UserId) -> Result<Flag, FlagError> {
        self.validate_key(&draft.key)?;
        self.validate_value(&draft.default_value)?;

        match draft.scope {
            FlagScope::Personal { owner } => {
                if owner != actor {
                    return Err(FlagError::Denied(
                        "a personal flag can only be created by its owner".to_string(),
                    ));
                }
            }
            FlagScope::Organization { organization_id } => {
                if !self.memberships.is_admin(actor, organization_id).await? {
                    return Err(FlagError::Denied(
                        "only organization admins may create organization flags".to_string(),
                    ));
                }
            }
        }

        // The friendly duplicate check; uniqueness under racing creates is
        // the store's (scope, key) constraint.
        if self
            .flags
            .flag_by_key(&draft.scope, &draft.key)
            .await?
            .is_some()
        {
            return Err(FlagError::DuplicateKey(draft.key));
        }

        let flag = draft.into_flag(Utc::now());
        let lock = self.mutation_lock(flag.id);
        let _guard = lock.lock().await;

        self.flags.insert_flag(&flag).await?;
        self.audit
            .record(
                AuditKind::Created,
                format!("flag {} created", flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish(&ChangeEvent::for_flag(EventKind::Created, &flag));

        tracing::info!(flag_id = %flag.id, "flag created");
        Ok(flag)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_flag(
        &self,
        flag_id: FlagId,
        patch: FlagPatch,
        actor: UserId,
    ) -> Result<Flag, FlagError> {
        if patch.is_empty() {
            return Err(FlagError::ValidationFailed(
                "nothing to update".to_string(),
            ));
        }

        let lock = self.mutation_lock(flag_id);
        let _guard = lock.lock().await;

        let Some(mut flag) = self.flags.flag_by_id(flag_id).await? else {
            return Err(FlagError::NotFound("flag"));
        };
        can_mutate_flag(&self.memberships, actor, &flag)
            .await?
            .into_result()?;

        if let Some(key) = &patch.key {
            self.validate_key(key)?;
            if *key != flag.key {
                let in_scope = self.flags.flag_by_key(&flag.scope, key).await?;
                if in_scope.is_some_and(|existing| existing.id != flag.id) {
                    return Err(FlagError::DuplicateKey(key.clone()));
                }
                flag.key = key.clone();
            }
        }
        if let Some(default_value) = patch.default_value {
            self.validate_value(&default_value)?;
            flag.default_value = default_value;
        }
        if let Some(description) = patch.description {
            flag.description = Some(description);
        }
        flag.updated_at = Utc::now();

        self.flags.update_flag(&flag).await?;
        self.audit
            .record(
                AuditKind::Updated,
                format!("flag {} updated", flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish(&ChangeEvent::for_flag(EventKind::Updated, &flag));

        Ok(flag)
    }

    /// Deletes the flag and every override attached to it. Audit records for
    /// the flag are retained and stay readable through the trail.
    #[instrument(skip(self))]
    pub async fn delete_flag(&self, flag_id: FlagId, actor: UserId) -> Result<(), FlagError> {
        let lock = self.mutation_lock(flag_id);
        let _guard = lock.lock().await;

        let Some(flag) = self.flags.flag_by_id(flag_id).await? else {
            return Err(FlagError::NotFound("flag"));
        };
        can_mutate_flag(&self.memberships, actor, &flag)
            .await?
            .into_result()?;

        // Overrides go first: a flag row must never outlive its overrides.
        let removed = self.overrides.delete_overrides_for_flag(flag_id).await?;
        self.flags.delete_flag(flag_id).await?;
        self.audit
            .record(
                AuditKind::Deleted,
                format!("flag {} deleted", flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish(&ChangeEvent::for_flag(EventKind::Deleted, &flag));

        tracing::info!(%flag_id, removed_overrides = removed, "flag deleted");
        drop(_guard);
        // Late arrivals re-create the entry and then observe NotFound.
        self.locks.remove(&flag_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn toggle_flag(&self, flag_id: FlagId, actor: UserId) -> Result<Flag, FlagError> {
        let lock = self.mutation_lock(flag_id);
        let _guard = lock.lock().await;

        let Some(mut flag) = self.flags.flag_by_id(flag_id).await? else {
            return Err(FlagError::NotFound("flag"));
        };
        can_mutate_flag(&self.memberships, actor, &flag)
            .await?
            .into_result()?;

        flag.enabled = !flag.enabled;
        flag.updated_at = Utc::now();

        self.flags.update_flag(&flag).await?;
        let state = if flag.enabled { "enabled" } else { "disabled" };
        self.audit
            .record(
                AuditKind::Toggled,
                format!("flag {} {state}", flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish(&ChangeEvent::for_flag(EventKind::Toggled, &flag));

        Ok(flag)
    }

    /// Writes the target user's override, replacing any existing value for
    /// the same (flag, user) pair. Only the target user's subscribers are
    /// notified; nobody else's resolved view changed.
    #[instrument(skip(self, value))]
    pub async fn upsert_override(
        &self,
        flag_id: FlagId,
        target: UserId,
        value: String,
        actor: UserId,
    ) -> Result<FlagOverride, FlagError> {
        self.validate_value(&value)?;

        let lock = self.mutation_lock(flag_id);
        let _guard = lock.lock().await;

        let Some(flag) = self.flags.flag_by_id(flag_id).await? else {
            return Err(FlagError::NotFound("flag"));
        };
        can_create_override_for(&self.memberships, actor, target, &flag)
            .await?
            .into_result()?;

        let stored = self
            .overrides
            .upsert_override(FlagOverride {
                id: Uuid::new_v4(),
                flag_id,
                user_id: target,
                value,
                updated_at: Utc::now(),
            })
            .await?;
        self.audit
            .record(
                AuditKind::OverrideCreated,
                format!("override for user {target} set on flag {}", flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish_to_user(target, &ChangeEvent::for_override(&flag, &stored.value));

        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn delete_override(
        &self,
        override_id: OverrideId,
        actor: UserId,
    ) -> Result<(), FlagError> {
        // First read is only to learn which flag to serialize on.
        let Some(preliminary) = self.overrides.override_by_id(override_id).await? else {
            return Err(FlagError::NotFound("override"));
        };

        let lock = self.mutation_lock(preliminary.flag_id);
        let _guard = lock.lock().await;

        let Some(row) = self.overrides.override_by_id(override_id).await? else {
            return Err(FlagError::NotFound("override"));
        };
        let Some(flag) = self.flags.flag_by_id(row.flag_id).await? else {
            return Err(FlagError::NotFound("flag"));
        };
        can_create_override_for(&self.memberships, actor, row.user_id, &flag)
            .await?
            .into_result()?;

        self.overrides.delete_override(override_id).await?;
        self.audit
            .record(
                AuditKind::OverrideDeleted,
                format!("override for user {} removed from flag {}", row.user_id, flag.key),
                flag.id,
                actor,
            )
            .await?;
        self.broadcaster
            .publish_to_user(row.user_id, &ChangeEvent::for_override_removed(&flag));

        Ok(())
    }

    fn mutation_lock(&self, flag_id: FlagId) -> Arc<Mutex<()>> {
        self.locks
            .entry(flag_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn validate_key(&self, key: &str) -> Result<(), FlagError> {
        if key.trim().is_empty() {
            return Err(FlagError::ValidationFailed(
                "flag key must not be empty".to_string(),
            ));
        }
        if key.len() > self.max_key_length {
            return Err(FlagError::ValidationFailed(format!(
                "flag key exceeds {} characters",
                self.max_key_length
            )));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(FlagError::ValidationFailed(
                "flag key must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_value(&self, value: &str) -> Result<(), FlagError> {
        if value.len() > self.max_value_bytes {
            return Err(FlagError::ValidationFailed(format!(
                "value exceeds {} bytes",
                self.max_value_bytes
            )));
        }
        Ok(())
    }
}
