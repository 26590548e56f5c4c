use common_types::{OrganizationId, UserId};

use crate::api::errors::FlagError;
use crate::flags::{Flag, FlagScope};
use crate::memberships::MembershipIndex;

/// Outcome of an authorization check. Denial is a normal result with a short
/// human-readable reason, not an error; only collaborator failures are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny(reason.into())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Maps a denial into the operation-level `Denied` outcome.
    pub fn into_result(self) -> Result<(), FlagError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(FlagError::Denied(reason)),
        }
    }
}

/// Personal flags are visible to their owner; organizational flags to every
/// member of the owning organization.
pub async fn can_view_flag(
    index: &MembershipIndex,
    viewer: UserId,
    flag: &Flag,
) -> Result<Decision, FlagError> {
    match flag.scope {
        FlagScope::Personal { owner } => {
            if owner == viewer {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny("only the owner may view this flag"))
            }
        }
        FlagScope::Organization { organization_id } => {
            if index.is_member(viewer, organization_id).await? {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny("not a member of the owning organization"))
            }
        }
    }
}

/// Personal flags are mutable by their owner; organizational flags only by
/// admins of the owning organization.
pub async fn can_mutate_flag(
    index: &MembershipIndex,
    actor: UserId,
    flag: &Flag,
) -> Result<Decision, FlagError> {
    match flag.scope {
        FlagScope::Personal { owner } => {
            if owner == actor {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny("only the owner may change this flag"))
            }
        }
        FlagScope::Organization { organization_id } => {
            if index.is_admin(actor, organization_id).await? {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny(
                    "only organization admins may change this flag",
                ))
            }
        }
    }
}

/// An override may be written by an organization admin for any target, or by
/// the target themself when they can view the flag. For personal flags that
/// collapses to the owner overriding their own flag.
pub async fn can_create_override_for(
    index: &MembershipIndex,
    actor: UserId,
    target: UserId,
    flag: &Flag,
) -> Result<Decision, FlagError> {
    match flag.scope {
        FlagScope::Personal { owner } => {
            if actor == target && owner == actor {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny(
                    "a personal flag can only be overridden by its owner, for themself",
                ))
            }
        }
        FlagScope::Organization { organization_id } => {
            if index.is_admin(actor, organization_id).await? {
                Ok(Decision::Allow)
            } else if actor == target && index.is_member(actor, organization_id).await? {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::deny(
                    "overrides require an organization admin, or a member overriding their own value",
                ))
            }
        }
    }
}

/// Membership rows are managed exclusively by admins of the organization.
pub async fn can_manage_membership(
    index: &MembershipIndex,
    actor: UserId,
    organization_id: OrganizationId,
) -> Result<Decision, FlagError> {
    if index.is_admin(actor, organization_id).await? {
        Ok(Decision::Allow)
    } else {
        Ok(Decision::deny(
            "only organization admins may manage memberships",
        ))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use uuid::Uuid;

    use super::*;
    use crate::memberships::{Membership, Role};
    use crate::storage::{MembershipStore, MemoryStore};
    use crate::test_utils::{org_flag, personal_flag};

    const ADMIN: UserId = 1;
    const MEMBER: UserId = 2;
    const OUTSIDER: UserId = 3;

    async fn org_fixture() -> (MembershipIndex, OrganizationId) {
        let org = Uuid::new_v4();
        let store = MemoryStore::new();
        store
            .upsert_membership(&Membership::new(org, ADMIN, Role::Admin))
            .await
            .unwrap();
        store
            .upsert_membership(&Membership::new(org, MEMBER, Role::Member))
            .await
            .unwrap();
        (MembershipIndex::new(store), org)
    }

    #[test_case(ADMIN, true; "admin views")]
    #[test_case(MEMBER, true; "member views")]
    #[test_case(OUTSIDER, false; "outsider denied")]
    #[tokio::test]
    async fn view_on_organizational_flag_tracks_membership(viewer: UserId, allowed: bool) {
        let (index, org) = org_fixture().await;
        let flag = org_flag(org, "new-search", "0");

        let decision = can_view_flag(&index, viewer, &flag).await.unwrap();
        assert_eq!(decision.is_allowed(), allowed);
    }

    #[test_case(ADMIN, true; "admin mutates")]
    #[test_case(MEMBER, false; "member denied")]
    #[test_case(OUTSIDER, false; "outsider denied")]
    #[tokio::test]
    async fn mutate_on_organizational_flag_requires_admin(actor: UserId, allowed: bool) {
        let (index, org) = org_fixture().await;
        let flag = org_flag(org, "new-search", "0");

        let decision = can_mutate_flag(&index, actor, &flag).await.unwrap();
        assert_eq!(decision.is_allowed(), allowed);
    }

    #[tokio::test]
    async fn personal_flag_is_private_to_its_owner() {
        let (index, _org) = org_fixture().await;
        let flag = personal_flag(ADMIN, "beta-ui", "false");

        assert!(can_view_flag(&index, ADMIN, &flag).await.unwrap().is_allowed());
        assert!(can_mutate_flag(&index, ADMIN, &flag).await.unwrap().is_allowed());
        assert!(!can_view_flag(&index, MEMBER, &flag).await.unwrap().is_allowed());
        assert!(!can_mutate_flag(&index, MEMBER, &flag).await.unwrap().is_allowed());
    }

    #[test_case(ADMIN, MEMBER, true; "admin for a member")]
    #[test_case(ADMIN, OUTSIDER, true; "admin for any target")]
    #[test_case(MEMBER, MEMBER, true; "member for themself")]
    #[test_case(MEMBER, ADMIN, false; "member for someone else")]
    #[test_case(OUTSIDER, OUTSIDER, false; "outsider even for themself")]
    #[tokio::test]
    async fn override_rights_on_organizational_flag(actor: UserId, target: UserId, allowed: bool) {
        let (index, org) = org_fixture().await;
        let flag = org_flag(org, "new-search", "0");

        let decision = can_create_override_for(&index, actor, target, &flag)
            .await
            .unwrap();
        assert_eq!(decision.is_allowed(), allowed);
    }

    #[tokio::test]
    async fn personal_override_is_owner_for_themself_only() {
        let (index, _org) = org_fixture().await;
        let flag = personal_flag(MEMBER, "beta-ui", "false");

        assert!(can_create_override_for(&index, MEMBER, MEMBER, &flag)
            .await
            .unwrap()
            .is_allowed());
        assert!(!can_create_override_for(&index, MEMBER, ADMIN, &flag)
            .await
            .unwrap()
            .is_allowed());
        assert!(!can_create_override_for(&index, ADMIN, MEMBER, &flag)
            .await
            .unwrap()
            .is_allowed());
    }

    #[test_case(ADMIN, true; "admin manages")]
    #[test_case(MEMBER, false; "member denied")]
    #[test_case(OUTSIDER, false; "outsider denied")]
    #[tokio::test]
    async fn membership_management_requires_admin(actor: UserId, allowed: bool) {
        let (index, org) = org_fixture().await;

        let decision = can_manage_membership(&index, actor, org).await.unwrap();
        assert_eq!(decision.is_allowed(), allowed);
    }

    #[tokio::test]
    async fn denial_maps_to_the_denied_outcome() {
        let (index, org) = org_fixture().await;
        let flag = org_flag(org, "new-search", "0");

        let result = can_mutate_flag(&index, MEMBER, &flag)
            .await
            .unwrap()
            .into_result();
        let error = result.unwrap_err();
        assert!(error.is_denied());
        assert_eq!(error.error_code(), "denied");
    }
}
