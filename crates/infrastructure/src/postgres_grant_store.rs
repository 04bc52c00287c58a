use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use geogrant_application::{
    EffectiveAccessRepository, GrantRepository, PermanentAssignmentRepository, RegionGrantQuery,
    SweepLease, SweepLeaseCoordinator, validate_sweep_lease_request,
};
use geogrant_core::{AppError, AppResult, UserId};
use geogrant_domain::{
    AccessJustification, EffectiveAccess, GrantId, GrantRevocation, PermanentAssignment,
    RegionAccessGrant, RegionId, StoredRegionAccessGrant,
};

mod assignments;
mod grants;
mod lease;
mod projection;
mod sweep;

/// PostgreSQL-backed store for grants, permanent assignments and the
/// effective-access projection.
///
/// Mutations of one `(user, region)` pair take a transaction-scoped advisory
/// lock on the pair before reading anything, so existence checks and writes
/// are atomic per pair while unrelated pairs proceed in parallel.
///
/// Sweep leases live in `grant_sweep_leases`, one row per scope, taken over
/// only once the previous holder's lease has lapsed.
#[derive(Clone)]
pub struct PostgresGrantStore {
    pool: PgPool,
}

impl PostgresGrantStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Storage(format!("failed to begin transaction: {error}")))
    }
}

async fn commit(transaction: Transaction<'static, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Storage(format!("failed to commit transaction: {error}")))
}

/// Serializes writers of one `(user, region)` pair until the transaction ends.
async fn lock_pair(
    connection: &mut PgConnection,
    user_id: UserId,
    region: &RegionId,
) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("region-access:{user_id}:{region}"))
        .execute(connection)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to lock access pair for user '{user_id}' in region '{region}': {error}"
            ))
        })?;

    Ok(())
}

#[derive(Debug, FromRow)]
struct GrantRow {
    id: Uuid,
    subject_user_id: Uuid,
    region: String,
    access_level: String,
    granted_by_user_id: Uuid,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    reason: String,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by_user_id: Option<Uuid>,
    revoke_reason: Option<String>,
}

impl TryFrom<GrantRow> for RegionAccessGrant {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let revocation = match (row.revoked_at, row.revoked_by_user_id) {
            (None, _) => None,
            (Some(revoked_at), Some(revoked_by_user_id)) => Some(GrantRevocation {
                revoked_at,
                revoked_by_user_id: UserId::from_uuid(revoked_by_user_id),
                reason: row.revoke_reason,
            }),
            (Some(_), None) => {
                return Err(AppError::Internal(format!(
                    "grant '{}' is revoked without a revoking user",
                    row.id
                )));
            }
        };

        RegionAccessGrant::restore(StoredRegionAccessGrant {
            grant_id: GrantId::from_uuid(row.id),
            subject_user_id: UserId::from_uuid(row.subject_user_id),
            region: row.region,
            access_level: row.access_level,
            granted_by_user_id: UserId::from_uuid(row.granted_by_user_id),
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            reason: row.reason,
            revocation,
        })
        .map_err(|error| {
            AppError::Internal(format!("failed to decode grant '{}': {error}", row.id))
        })
    }
}

fn grants_from_rows(rows: Vec<GrantRow>) -> AppResult<Vec<RegionAccessGrant>> {
    rows.into_iter().map(RegionAccessGrant::try_from).collect()
}

#[derive(Debug, FromRow)]
struct EffectiveAccessRow {
    user_id: Uuid,
    region: String,
    justification: String,
}

impl TryFrom<EffectiveAccessRow> for EffectiveAccess {
    type Error = AppError;

    fn try_from(row: EffectiveAccessRow) -> Result<Self, Self::Error> {
        let user_id = row.user_id;
        let decode = move |error: AppError| {
            AppError::Internal(format!(
                "failed to decode effective access for user '{user_id}': {error}"
            ))
        };

        Ok(Self {
            user_id: UserId::from_uuid(user_id),
            region: RegionId::new(row.region).map_err(decode)?,
            justification: row
                .justification
                .parse::<AccessJustification>()
                .map_err(decode)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct PermanentAssignmentRow {
    user_id: Uuid,
    region: String,
    assigned_by_user_id: Uuid,
    assigned_at: DateTime<Utc>,
}

impl TryFrom<PermanentAssignmentRow> for PermanentAssignment {
    type Error = AppError;

    fn try_from(row: PermanentAssignmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::from_uuid(row.user_id),
            region: RegionId::new(row.region).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode permanent assignment for user '{}': {error}",
                    row.user_id
                ))
            })?,
            assigned_by_user_id: UserId::from_uuid(row.assigned_by_user_id),
            assigned_at: row.assigned_at,
        })
    }
}

#[async_trait]
impl GrantRepository for PostgresGrantStore {
    async fn insert_grant(&self, grant: &RegionAccessGrant, now: DateTime<Utc>) -> AppResult<()> {
        self.insert_grant_impl(grant, now).await
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<RegionAccessGrant>> {
        self.find_grant_impl(grant_id).await
    }

    async fn update_grant_expiry(
        &self,
        grant_id: GrantId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<RegionAccessGrant> {
        self.update_grant_expiry_impl(grant_id, new_expires_at, now)
            .await
    }

    async fn revoke_grant(
        &self,
        grant_id: GrantId,
        revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant> {
        self.revoke_grant_impl(grant_id, revocation).await
    }

    async fn list_grants(
        &self,
        query: &RegionGrantQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        self.list_grants_impl(query, now).await
    }

    async fn list_active_grants_expiring_before(
        &self,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        self.list_active_grants_expiring_before_impl(now, deadline)
            .await
    }

    async fn list_unreconciled_expired_grants(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        self.list_unreconciled_expired_grants_impl(now, limit).await
    }

    async fn mark_grant_expired(&self, grant_id: GrantId, now: DateTime<Utc>) -> AppResult<bool> {
        self.mark_grant_expired_impl(grant_id, now).await
    }
}

#[async_trait]
impl EffectiveAccessRepository for PostgresGrantStore {
    async fn find_effective_access(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>> {
        self.find_effective_access_impl(user_id, region).await
    }

    async fn list_effective_access_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>> {
        self.list_effective_access_for_user_impl(user_id).await
    }

    async fn rebuild_effective_access(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.rebuild_effective_access_impl(now).await
    }
}

#[async_trait]
impl PermanentAssignmentRepository for PostgresGrantStore {
    async fn insert_permanent_assignment(
        &self,
        assignment: &PermanentAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.insert_permanent_assignment_impl(assignment, now).await
    }

    async fn delete_permanent_assignment(
        &self,
        user_id: UserId,
        region: &RegionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.delete_permanent_assignment_impl(user_id, region, now)
            .await
    }

    async fn list_permanent_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>> {
        self.list_permanent_assignments_for_user_impl(user_id).await
    }
}

#[async_trait]
impl SweepLeaseCoordinator for PostgresGrantStore {
    async fn try_acquire_sweep_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        self.try_acquire_sweep_lease_impl(scope_key, holder_id, lease_seconds)
            .await
    }

    async fn renew_sweep_lease(&self, lease: &SweepLease, lease_seconds: u32) -> AppResult<bool> {
        self.renew_sweep_lease_impl(lease, lease_seconds).await
    }

    async fn release_sweep_lease(&self, lease: &SweepLease) -> AppResult<()> {
        self.release_sweep_lease_impl(lease).await
    }
}
