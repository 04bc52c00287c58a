use async_trait::async_trait;
use chrono::{DateTime, Utc};

use geogrant_core::AppResult;
use geogrant_domain::{GrantId, GrantRevocation, RegionAccessGrant};

use super::inputs::RegionGrantQuery;

/// Repository port for the grant record of truth.
///
/// Every mutating method serializes on the `(subject, region)` pair and
/// recomputes that pair's effective-access row before returning, so the
/// grant table and the projection never disagree after a committed write.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Inserts a freshly issued grant.
    ///
    /// Fails with `Conflict` when the pair has a permanent assignment or an
    /// active grant at `now`.
    async fn insert_grant(&self, grant: &RegionAccessGrant, now: DateTime<Utc>) -> AppResult<()>;

    /// Loads one grant by id.
    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<RegionAccessGrant>>;

    /// Moves the expiry of a grant that is still active at `now`.
    ///
    /// Activity is re-checked under the pair lock; returns `NotFound`,
    /// `AlreadyTerminal` or `Validation` without touching the row.
    async fn update_grant_expiry(
        &self,
        grant_id: GrantId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<RegionAccessGrant>;

    /// Revokes a grant that is still active at `revocation.revoked_at`.
    async fn revoke_grant(
        &self,
        grant_id: GrantId,
        revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant>;

    /// Lists grants matching the query, newest first.
    async fn list_grants(
        &self,
        query: &RegionGrantQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>>;

    /// Lists grants active at `now` whose expiry is strictly before
    /// `deadline`, soonest first.
    async fn list_active_grants_expiring_before(
        &self,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>>;

    /// Lists elapsed, unrevoked grants the reconciler has not folded yet,
    /// oldest expiry first.
    async fn list_unreconciled_expired_grants(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>>;

    /// Records the grant as reconciled and recomputes its pair.
    ///
    /// Returns `false` when the grant is no longer expired at `now` or was
    /// already recorded, in which case nothing changes.
    async fn mark_grant_expired(&self, grant_id: GrantId, now: DateTime<Utc>) -> AppResult<bool>;
}
