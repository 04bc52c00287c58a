use std::sync::Arc;

use chrono::{DateTime, Utc};
use geogrant_core::{AppResult, UserId, UserIdentity};
use geogrant_domain::{AccessJustification, EffectiveAccess, Permission, RegionId};
use tracing::{debug, info};

use crate::AuthorizationService;
use crate::access_ports::EffectiveAccessRepository;
use crate::clock::Clock;
use crate::grant_ports::GrantRepository;

/// Read side of the effective-access projection.
///
/// Temporary rows are re-verified against their grant on every read, so a
/// row the reconciler has not pruned yet never grants access.
#[derive(Clone)]
pub struct EffectiveAccessService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn EffectiveAccessRepository>,
    grant_repository: Arc<dyn GrantRepository>,
    clock: Arc<dyn Clock>,
}

impl EffectiveAccessService {
    /// Creates a new effective-access service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn EffectiveAccessRepository>,
        grant_repository: Arc<dyn GrantRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            grant_repository,
            clock,
        }
    }

    /// Returns whether the user may currently act on the region.
    pub async fn has_access(&self, user_id: UserId, region: &RegionId) -> AppResult<bool> {
        Ok(self.verified_access(user_id, region).await?.is_some())
    }

    /// Returns the verified projection row for a pair on behalf of `actor`.
    pub async fn effective_access_for(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        region: &str,
    ) -> AppResult<Option<EffectiveAccess>> {
        self.require_read_for_user(actor, user_id).await?;
        let region = RegionId::new(region)?;

        self.verified_access(user_id, &region).await
    }

    /// Lists verified projection rows for a user.
    pub async fn list_for_user(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>> {
        self.require_read_for_user(actor, user_id).await?;

        let now = self.clock.now();
        let rows = self
            .repository
            .list_effective_access_for_user(user_id)
            .await?;

        let mut verified = Vec::with_capacity(rows.len());
        for row in rows {
            if self.is_still_justified(&row, now).await? {
                verified.push(row);
            }
        }

        Ok(verified)
    }

    /// Replays permanent assignments and active grants into the projection.
    pub async fn rebuild(&self) -> AppResult<u64> {
        let now = self.clock.now();
        let rows = self.repository.rebuild_effective_access(now).await?;
        info!(rows, "rebuilt effective-access projection");

        Ok(rows)
    }

    async fn verified_access(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>> {
        let Some(row) = self
            .repository
            .find_effective_access(user_id, region)
            .await?
        else {
            return Ok(None);
        };

        if self.is_still_justified(&row, self.clock.now()).await? {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    async fn is_still_justified(
        &self,
        row: &EffectiveAccess,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let AccessJustification::Temporary(grant_id) = row.justification else {
            return Ok(true);
        };

        let active = self
            .grant_repository
            .find_grant(grant_id)
            .await?
            .is_some_and(|grant| grant.is_active_at(now));

        if !active {
            debug!(
                grant_id = %grant_id,
                user_id = %row.user_id,
                region = %row.region,
                "ignoring stale temporary access row"
            );
        }

        Ok(active)
    }

    async fn require_read_for_user(&self, actor: &UserIdentity, user_id: UserId) -> AppResult<()> {
        if actor.user_id() == user_id {
            return Ok(());
        }

        self.authorization_service
            .require_any_permission(
                actor.user_id(),
                &[Permission::RegionGrantRead, Permission::RegionGrantManage],
            )
            .await
    }
}

#[cfg(test)]
mod tests;
