use std::collections::HashMap;

use common_types::{FlagId, UserId};
use tracing::instrument;

use crate::api::errors::FlagError;
use crate::api::types::EffectiveValue;
use crate::flags::flag_models::{Flag, FlagOverride, FlagScope};
use crate::storage::{SharedFlagStore, SharedOverrideStore};

/// Computes the effective value of flags for a specific viewer.
///
/// Precedence is fixed and two-level: a per-user override is authoritative,
/// otherwise the flag's default applies. Stored values pass through as opaque
/// typed strings — a boolean-typed flag whose override reads `"yes"` resolves
/// to `"yes"`; interpretation belongs to the caller.
#[derive(Clone)]
pub struct FlagResolver {
    flags: SharedFlagStore,
    overrides: SharedOverrideStore,
}

impl FlagResolver {
    pub fn new(flags: SharedFlagStore, overrides: SharedOverrideStore) -> Self {
        FlagResolver { flags, overrides }
    }

    pub async fn resolve(&self, flag: &Flag, viewer: UserId) -> Result<EffectiveValue, FlagError> {
        let override_row = self.overrides.override_for(flag.id, viewer).await?;
        Ok(resolve_with_override(flag, override_row.as_ref()))
    }

    /// Resolves a whole set of flags for one viewer into a key → value map.
    ///
    /// The viewer's overrides are fetched once up front; if that read fails
    /// the entire batch fails rather than silently falling back to defaults.
    #[instrument(skip_all, fields(flag_count = flags.len()))]
    pub async fn resolve_all(
        &self,
        flags: &[Flag],
        viewer: UserId,
    ) -> Result<HashMap<String, EffectiveValue>, FlagError> {
        let overrides = self.overrides.overrides_for_user(viewer).await.map_err(|e| {
            tracing::warn!(viewer, "failed to load overrides for batch resolution: {e}");
            e
        })?;
        let by_flag: HashMap<FlagId, &FlagOverride> =
            overrides.iter().map(|o| (o.flag_id, o)).collect();

        Ok(flags
            .iter()
            .map(|flag| {
                (
                    flag.key.clone(),
                    resolve_with_override(flag, by_flag.get(&flag.id).copied()),
                )
            })
            .collect())
    }

    /// Dashboard snapshot: every flag in the scope, resolved for the viewer.
    pub async fn snapshot_for_scope(
        &self,
        scope: &FlagScope,
        viewer: UserId,
    ) -> Result<HashMap<String, EffectiveValue>, FlagError> {
        let flags = self.flags.flags_for_scope(scope).await?;
        self.resolve_all(&flags, viewer).await
    }
}

/// The pure core: a function of the flag and the viewer's override row only.
pub(crate) fn resolve_with_override(
    flag: &Flag,
    override_row: Option<&FlagOverride>,
) -> EffectiveValue {
    match override_row {
        Some(row) => EffectiveValue {
            value: row.value.clone(),
            is_overridden: true,
        },
        None => EffectiveValue {
            value: flag.default_value.clone(),
            is_overridden: false,
        },
    }
}
