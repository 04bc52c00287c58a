use async_trait::async_trait;
use chrono::{DateTime, Utc};

use geogrant_core::{AppResult, UserId};
use geogrant_domain::{EffectiveAccess, PermanentAssignment, RegionId};

/// Repository port for the effective-access projection.
#[async_trait]
pub trait EffectiveAccessRepository: Send + Sync {
    /// Loads the projection row for a pair.
    async fn find_effective_access(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>>;

    /// Lists projection rows for one user ordered by region.
    async fn list_effective_access_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>>;

    /// Replaces the projection with rows replayed from permanent assignments
    /// and grants active at `now`; returns the number of rows written.
    async fn rebuild_effective_access(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Repository port for permanent region assignments.
///
/// Shares the pair lock and projection recompute with [`crate::GrantRepository`].
#[async_trait]
pub trait PermanentAssignmentRepository: Send + Sync {
    /// Inserts a permanent assignment and retags the pair as permanent.
    ///
    /// Fails with `Conflict` when the pair is already assigned or holds a
    /// grant active at `now`.
    async fn insert_permanent_assignment(
        &self,
        assignment: &PermanentAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Deletes a permanent assignment and recomputes the pair.
    ///
    /// Returns `false` when no assignment existed.
    async fn delete_permanent_assignment(
        &self,
        user_id: UserId,
        region: &RegionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Lists permanent assignments for one user ordered by region.
    async fn list_permanent_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>>;
}
