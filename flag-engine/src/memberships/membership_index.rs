use common_types::{OrganizationId, UserId};

use crate::api::errors::FlagError;
use crate::memberships::membership_models::{Membership, Role};
use crate::storage::SharedMembershipStore;

/// Read-only query façade over the membership store.
///
/// Every query goes straight to the store — no per-request caching — so a
/// membership written earlier in the same mutation flow is visible to the
/// next authorization check. An organization with no rows is indistinguishable
/// from one that does not exist: queries answer false/empty, never an error.
#[derive(Clone)]
pub struct MembershipIndex {
    store: SharedMembershipStore,
}

impl MembershipIndex {
    pub fn new(store: SharedMembershipStore) -> Self {
        MembershipIndex { store }
    }

    pub async fn is_member(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<bool, FlagError> {
        Ok(self.store.membership(organization_id, user_id).await?.is_some())
    }

    /// False when the user is not a member at all.
    pub async fn is_admin(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<bool, FlagError> {
        Ok(self
            .store
            .membership(organization_id, user_id)
            .await?
            .is_some_and(|m| m.role.is_admin()))
    }

    pub async fn role_of(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Role>, FlagError> {
        Ok(self
            .store
            .membership(organization_id, user_id)
            .await?
            .map(|m| m.role))
    }

    pub async fn members_of(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Membership>, FlagError> {
        Ok(self.store.memberships_for_org(organization_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::storage::{MembershipStore, MemoryStore};

    async fn index_with(rows: Vec<Membership>) -> MembershipIndex {
        let store = MemoryStore::new();
        for row in &rows {
            store.upsert_membership(row).await.unwrap();
        }
        MembershipIndex::new(store)
    }

    #[tokio::test]
    async fn unknown_organization_answers_false_and_empty() {
        let index = index_with(vec![]).await;
        let org = Uuid::new_v4();

        assert!(!index.is_member(1, org).await.unwrap());
        assert!(!index.is_admin(1, org).await.unwrap());
        assert_eq!(index.role_of(1, org).await.unwrap(), None);
        assert!(index.members_of(org).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_is_not_admin() {
        let org = Uuid::new_v4();
        let index = index_with(vec![Membership::new(org, 1, Role::Member)]).await;

        assert!(index.is_member(1, org).await.unwrap());
        assert!(!index.is_admin(1, org).await.unwrap());
        assert_eq!(index.role_of(1, org).await.unwrap(), Some(Role::Member));
    }

    #[tokio::test]
    async fn admin_is_both_member_and_admin() {
        let org = Uuid::new_v4();
        let index = index_with(vec![Membership::new(org, 2, Role::Admin)]).await;

        assert!(index.is_member(2, org).await.unwrap());
        assert!(index.is_admin(2, org).await.unwrap());
        assert_eq!(index.role_of(2, org).await.unwrap(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn members_of_lists_every_row_for_the_organization() {
        let org = Uuid::new_v4();
        let other = Uuid::new_v4();
        let index = index_with(vec![
            Membership::new(org, 1, Role::Admin),
            Membership::new(org, 2, Role::Member),
            Membership::new(other, 3, Role::Admin),
        ])
        .await;

        let mut user_ids: Vec<UserId> = index
            .members_of(org)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        user_ids.sort();
        assert_eq!(user_ids, vec![1, 2]);
    }
}
