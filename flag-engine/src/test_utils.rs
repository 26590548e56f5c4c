use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common_types::{ConnectionId, FlagId, OrganizationId, OverrideId, UserId};
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::types::ChangeEvent;
use crate::audit::AuditTrail;
use crate::broadcast::{ChangeBroadcaster, Subscriber};
use crate::config::Config;
use crate::flags::{Flag, FlagOverride, FlagResolver, FlagScope, FlagService, FlagType, NewFlag};
use crate::memberships::MembershipService;
use crate::storage::{MemoryStore, OverrideStore, StoreError};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn personal_flag(owner: UserId, key: &str, default_value: &str) -> Flag {
    flag_in_scope(FlagScope::Personal { owner }, key, default_value)
}

pub fn org_flag(organization_id: OrganizationId, key: &str, default_value: &str) -> Flag {
    flag_in_scope(
        FlagScope::Organization { organization_id },
        key,
        default_value,
    )
}

fn flag_in_scope(scope: FlagScope, key: &str, default_value: &str) -> Flag {
    let now = Utc::now();
    Flag {
        id: Uuid::new_v4(),
        key: key.to_string(),
        flag_type: FlagType::Boolean,
        default_value: default_value.to_string(),
        description: None,
        scope,
        enabled: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn new_personal_flag(owner: UserId, key: &str) -> NewFlag {
    NewFlag {
        key: key.to_string(),
        flag_type: FlagType::Boolean,
        default_value: "false".to_string(),
        description: None,
        scope: FlagScope::Personal { owner },
    }
}

pub fn new_org_flag(organization_id: OrganizationId, key: &str) -> NewFlag {
    NewFlag {
        key: key.to_string(),
        flag_type: FlagType::Boolean,
        default_value: "0".to_string(),
        description: None,
        scope: FlagScope::Organization { organization_id },
    }
}

/// Every engine component wired over one shared `MemoryStore`.
pub struct EngineHarness {
    pub store: Arc<MemoryStore>,
    pub config: Config,
    pub service: FlagService,
    pub resolver: FlagResolver,
    pub audit: AuditTrail,
    pub broadcaster: Arc<ChangeBroadcaster>,
    pub memberships: MembershipService,
}

impl EngineHarness {
    /// Fresh organization with `admin` seeded as its founding admin.
    pub async fn seed_org_with_admin(&self, admin: UserId) -> OrganizationId {
        let organization_id = Uuid::new_v4();
        self.memberships
            .seed_admin(organization_id, admin)
            .await
            .expect("failed to seed admin");
        organization_id
    }

    /// Registers a live subscriber for `user_id` and hands back the receiving
    /// end of its event channel.
    pub fn attach_subscriber(
        &self,
        user_id: UserId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.broadcaster.register(Subscriber {
            connection_id,
            user_id,
            sender: tx,
        });
        (connection_id, rx)
    }
}

pub fn setup_memory_engine() -> EngineHarness {
    let store = MemoryStore::new();
    let config = Config::default_test_config();
    let broadcaster = Arc::new(ChangeBroadcaster::new());
    let memberships = MembershipService::new(store.clone());
    let audit = AuditTrail::new(store.clone(), config.audit_history_limit);
    let resolver = FlagResolver::new(store.clone(), store.clone());
    let service = FlagService::new(
        store.clone(),
        store.clone(),
        memberships.index().clone(),
        audit.clone(),
        broadcaster.clone(),
        &config,
    );

    EngineHarness {
        store,
        config,
        service,
        resolver,
        audit,
        broadcaster,
        memberships,
    }
}

/// Override store whose every call fails, for exercising batch failure paths.
pub struct FailingOverrideStore;

#[async_trait]
impl OverrideStore for FailingOverrideStore {
    async fn upsert_override(&self, _candidate: FlagOverride) -> Result<FlagOverride, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }

    async fn override_by_id(&self, _id: OverrideId) -> Result<Option<FlagOverride>, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }

    async fn override_for(
        &self,
        _flag_id: FlagId,
        _user_id: UserId,
    ) -> Result<Option<FlagOverride>, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }

    async fn overrides_for_user(&self, _user_id: UserId) -> Result<Vec<FlagOverride>, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }

    async fn delete_override(&self, _id: OverrideId) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }

    async fn delete_overrides_for_flag(&self, _flag_id: FlagId) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("override store down".to_string()))
    }
}
