use chrono::Utc;
use common_types::{FlagId, UserId};
use tracing::instrument;
use uuid::Uuid;

use crate::api::errors::FlagError;
use crate::audit::audit_models::{AuditKind, AuditRecord};
use crate::storage::SharedAuditStore;

/// Append-only trail of flag and override mutations.
///
/// A failed append surfaces to the caller: the mutation that triggered it is
/// not fully committed until its audit record is written, so the coordinator
/// must not broadcast after an append error.
#[derive(Clone)]
pub struct AuditTrail {
    store: SharedAuditStore,
    history_limit: usize,
}

impl AuditTrail {
    pub fn new(store: SharedAuditStore, history_limit: usize) -> Self {
        AuditTrail {
            store,
            history_limit,
        }
    }

    #[instrument(skip(self, message))]
    pub async fn record(
        &self,
        kind: AuditKind,
        message: impl Into<String>,
        flag_id: FlagId,
        actor: UserId,
    ) -> Result<AuditRecord, FlagError> {
        let record = AuditRecord {
            id: Uuid::new_v4(),
            flag_id,
            actor,
            kind,
            message: message.into(),
            created_at: Utc::now(),
        };

        self.store.append_audit(&record).await.map_err(|e| {
            tracing::error!(%flag_id, %kind, "failed to append audit record: {e}");
            e
        })?;
        Ok(record)
    }

    /// History for one flag, newest first, capped at the configured limit.
    /// Keeps answering after the flag itself has been deleted.
    pub async fn history(&self, flag_id: FlagId) -> Result<Vec<AuditRecord>, FlagError> {
        let mut records = self.store.audit_for_flag(flag_id).await?;
        records.truncate(self.history_limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::storage::MemoryStore;

    fn trail_with_limit(limit: usize) -> AuditTrail {
        AuditTrail::new(MemoryStore::new(), limit)
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let trail = trail_with_limit(100);
        let flag_id = Uuid::new_v4();

        trail
            .record(AuditKind::Created, "flag created", flag_id, 1)
            .await
            .unwrap();
        trail
            .record(AuditKind::Toggled, "flag disabled", flag_id, 1)
            .await
            .unwrap();

        let history = trail.history(flag_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, AuditKind::Toggled);
        assert_eq!(history[1].kind, AuditKind::Created);
    }

    #[tokio::test]
    async fn history_only_returns_the_requested_flag() {
        let trail = trail_with_limit(100);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        trail
            .record(AuditKind::Created, "flag created", first, 1)
            .await
            .unwrap();
        trail
            .record(AuditKind::Created, "flag created", second, 2)
            .await
            .unwrap();

        let history = trail.history(first).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].flag_id, first);
        assert_eq!(history[0].actor, 1);
    }

    #[tokio::test]
    async fn history_respects_the_configured_limit() {
        let trail = trail_with_limit(2);
        let flag_id = Uuid::new_v4();

        for n in 0..5 {
            trail
                .record(AuditKind::Updated, format!("edit {n}"), flag_id, 1)
                .await
                .unwrap();
        }

        let history = trail.history(flag_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "edit 4");
        assert_eq!(history[1].message, "edit 3");
    }

    #[tokio::test]
    async fn unknown_flag_has_empty_history() {
        let trail = trail_with_limit(100);
        assert!(trail.history(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
