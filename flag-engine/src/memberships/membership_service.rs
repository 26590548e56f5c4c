use common_types::{OrganizationId, UserId};
use tracing::instrument;

use crate::api::errors::FlagError;
use crate::api::permissions::can_manage_membership;
use crate::memberships::membership_index::MembershipIndex;
use crate::memberships::membership_models::{Membership, Role};
use crate::storage::SharedMembershipStore;

/// Membership lifecycle: adding, re-roling, and removing organization
/// members. All operations except `seed_admin` are admin-gated.
///
/// An organization is never left without an admin: demoting or removing the
/// last admin is refused.
#[derive(Clone)]
pub struct MembershipService {
    store: SharedMembershipStore,
    index: MembershipIndex,
}

impl MembershipService {
    pub fn new(store: SharedMembershipStore) -> Self {
        let index = MembershipIndex::new(store.clone());
        MembershipService { store, index }
    }

    pub fn index(&self) -> &MembershipIndex {
        &self.index
    }

    /// Creates the founding admin row for a brand-new organization. This is
    /// the organization-creation path, so there is no admin to ask: the call
    /// is refused only when the organization already has members.
    #[instrument(skip(self))]
    pub async fn seed_admin(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Membership, FlagError> {
        let existing = self.store.memberships_for_org(organization_id).await?;
        if !existing.is_empty() {
            return Err(FlagError::ValidationFailed(
                "organization already has members".to_string(),
            ));
        }

        let membership = Membership::new(organization_id, user_id, Role::Admin);
        self.store.upsert_membership(&membership).await?;
        tracing::info!(%organization_id, user_id, "seeded founding admin");
        Ok(membership)
    }

    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
        actor: UserId,
    ) -> Result<Membership, FlagError> {
        can_manage_membership(&self.index, actor, organization_id)
            .await?
            .into_result()?;

        if self.store.membership(organization_id, user_id).await?.is_some() {
            return Err(FlagError::DuplicateKey(format!(
                "user {user_id} is already a member"
            )));
        }

        let membership = Membership::new(organization_id, user_id, role);
        self.store.upsert_membership(&membership).await?;
        tracing::info!(%organization_id, user_id, %role, "member added");
        Ok(membership)
    }

    #[instrument(skip(self))]
    pub async fn change_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
        actor: UserId,
    ) -> Result<Membership, FlagError> {
        can_manage_membership(&self.index, actor, organization_id)
            .await?
            .into_result()?;

        let Some(mut membership) = self.store.membership(organization_id, user_id).await? else {
            return Err(FlagError::NotFound("membership"));
        };

        if membership.role.is_admin()
            && !role.is_admin()
            && self.admin_count(organization_id).await? == 1
        {
            return Err(FlagError::Denied(
                "organization must retain at least one admin".to_string(),
            ));
        }

        membership.role = role;
        self.store.upsert_membership(&membership).await?;
        tracing::info!(%organization_id, user_id, %role, "role changed");
        Ok(membership)
    }

    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        actor: UserId,
    ) -> Result<(), FlagError> {
        can_manage_membership(&self.index, actor, organization_id)
            .await?
            .into_result()?;

        let Some(membership) = self.store.membership(organization_id, user_id).await? else {
            return Err(FlagError::NotFound("membership"));
        };

        if membership.role.is_admin() && self.admin_count(organization_id).await? == 1 {
            return Err(FlagError::Denied(
                "organization must retain at least one admin".to_string(),
            ));
        }

        self.store.delete_membership(organization_id, user_id).await?;
        tracing::info!(%organization_id, user_id, "member removed");
        Ok(())
    }

    async fn admin_count(&self, organization_id: OrganizationId) -> Result<usize, FlagError> {
        Ok(self
            .store
            .memberships_for_org(organization_id)
            .await?
            .iter()
            .filter(|m| m.role.is_admin())
            .count())
    }
}
