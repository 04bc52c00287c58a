use super::*;

use super::projection::recompute_pair;

/// Loads a grant row under `FOR UPDATE`, for callers holding the pair lock.
async fn load_grant_for_update(
    connection: &mut PgConnection,
    grant_id: GrantId,
) -> AppResult<Option<RegionAccessGrant>> {
    let row = sqlx::query_as::<_, GrantRow>(
        r#"
        SELECT
            id,
            subject_user_id,
            region,
            access_level,
            granted_by_user_id,
            granted_at,
            expires_at,
            reason,
            revoked_at,
            revoked_by_user_id,
            revoke_reason
        FROM region_access_grants
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(grant_id.as_uuid())
    .fetch_optional(connection)
    .await
    .map_err(|error| AppError::Storage(format!("failed to lock grant '{grant_id}': {error}")))?;

    row.map(RegionAccessGrant::try_from).transpose()
}

impl PostgresGrantStore {
    pub(super) async fn insert_grant_impl(
        &self,
        grant: &RegionAccessGrant,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let user_id = grant.subject_user_id();
        let region = grant.region();
        let mut transaction = self.begin().await?;
        lock_pair(&mut transaction, user_id, region).await?;

        let has_permanent_assignment = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM region_permanent_assignments
                WHERE user_id = $1
                  AND region = $2
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to check permanent assignment: {error}"))
        })?;

        if has_permanent_assignment {
            return Err(AppError::Conflict(format!(
                "user '{user_id}' already holds a permanent assignment for region '{region}'"
            )));
        }

        let active_grant_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM region_access_grants
            WHERE subject_user_id = $1
              AND region = $2
              AND revoked_at IS NULL
              AND expires_at > $3
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .bind(now)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Storage(format!("failed to check active grants: {error}")))?;

        if let Some(active_grant_id) = active_grant_id {
            return Err(AppError::Conflict(format!(
                "user '{user_id}' already has an active temporary grant '{active_grant_id}' for region '{region}'"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO region_access_grants (
                id,
                subject_user_id,
                region,
                access_level,
                granted_by_user_id,
                granted_at,
                expires_at,
                reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(grant.grant_id().as_uuid())
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .bind(grant.access_level().as_str())
        .bind(grant.granted_by_user_id().as_uuid())
        .bind(grant.granted_at())
        .bind(grant.expires_at())
        .bind(grant.reason())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to insert grant '{}': {error}",
                grant.grant_id()
            ))
        })?;

        recompute_pair(&mut transaction, user_id, region, now).await?;
        commit(transaction).await
    }

    pub(super) async fn find_grant_impl(
        &self,
        grant_id: GrantId,
    ) -> AppResult<Option<RegionAccessGrant>> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                id,
                subject_user_id,
                region,
                access_level,
                granted_by_user_id,
                granted_at,
                expires_at,
                reason,
                revoked_at,
                revoked_by_user_id,
                revoke_reason
            FROM region_access_grants
            WHERE id = $1
            "#,
        )
        .bind(grant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to load grant '{grant_id}': {error}")))?;

        row.map(RegionAccessGrant::try_from).transpose()
    }

    pub(super) async fn update_grant_expiry_impl(
        &self,
        grant_id: GrantId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<RegionAccessGrant> {
        let mut transaction = self.begin().await?;
        let mut grant = self.lock_existing_grant(&mut transaction, grant_id).await?;
        grant.change_expiry(new_expires_at, now)?;

        sqlx::query(
            r#"
            UPDATE region_access_grants
            SET expires_at = $2
            WHERE id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(grant_id.as_uuid())
        .bind(grant.expires_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to update expiry of grant '{grant_id}': {error}"
            ))
        })?;

        recompute_pair(
            &mut transaction,
            grant.subject_user_id(),
            grant.region(),
            now,
        )
        .await?;
        commit(transaction).await?;

        Ok(grant)
    }

    pub(super) async fn revoke_grant_impl(
        &self,
        grant_id: GrantId,
        revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant> {
        let now = revocation.revoked_at;
        let mut transaction = self.begin().await?;
        let mut grant = self.lock_existing_grant(&mut transaction, grant_id).await?;
        grant.revoke(revocation.clone())?;

        sqlx::query(
            r#"
            UPDATE region_access_grants
            SET revoked_at = $2,
                revoked_by_user_id = $3,
                revoke_reason = $4
            WHERE id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(grant_id.as_uuid())
        .bind(revocation.revoked_at)
        .bind(revocation.revoked_by_user_id.as_uuid())
        .bind(revocation.reason.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to revoke grant '{grant_id}': {error}"))
        })?;

        recompute_pair(
            &mut transaction,
            grant.subject_user_id(),
            grant.region(),
            now,
        )
        .await?;
        commit(transaction).await?;

        Ok(grant)
    }

    pub(super) async fn list_grants_impl(
        &self,
        query: &RegionGrantQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let capped_limit = i64::try_from(query.capped_limit()).unwrap_or(200);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                id,
                subject_user_id,
                region,
                access_level,
                granted_by_user_id,
                granted_at,
                expires_at,
                reason,
                revoked_at,
                revoked_by_user_id,
                revoke_reason
            FROM region_access_grants
            WHERE ($1::UUID IS NULL OR subject_user_id = $1)
              AND ($2::TEXT IS NULL OR region = $2)
              AND (
                  $3::TEXT IS NULL
                  OR ($3 = 'revoked' AND revoked_at IS NOT NULL)
                  OR ($3 = 'expired' AND revoked_at IS NULL AND expires_at <= $4)
                  OR ($3 = 'active' AND revoked_at IS NULL AND expires_at > $4)
              )
            ORDER BY granted_at DESC, id
            LIMIT $5
            OFFSET $6
            "#,
        )
        .bind(query.subject_user_id.map(|user_id| user_id.as_uuid()))
        .bind(query.region.as_ref().map(RegionId::as_str))
        .bind(query.status.map(|status| status.as_str()))
        .bind(now)
        .bind(capped_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list grants: {error}")))?;

        grants_from_rows(rows)
    }

    pub(super) async fn list_active_grants_expiring_before_impl(
        &self,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                id,
                subject_user_id,
                region,
                access_level,
                granted_by_user_id,
                granted_at,
                expires_at,
                reason,
                revoked_at,
                revoked_by_user_id,
                revoke_reason
            FROM region_access_grants
            WHERE revoked_at IS NULL
              AND expires_at > $1
              AND expires_at < $2
            ORDER BY expires_at, id
            "#,
        )
        .bind(now)
        .bind(deadline)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to list grants expiring soon: {error}"))
        })?;

        grants_from_rows(rows)
    }

    /// Resolves the grant's pair, takes the pair lock, then re-reads the row
    /// under `FOR UPDATE`.
    async fn lock_existing_grant(
        &self,
        connection: &mut PgConnection,
        grant_id: GrantId,
    ) -> AppResult<RegionAccessGrant> {
        let not_found = || AppError::NotFound(format!("grant '{grant_id}' does not exist"));

        let pair = self.find_grant_impl(grant_id).await?.ok_or_else(not_found)?;
        lock_pair(connection, pair.subject_user_id(), pair.region()).await?;

        load_grant_for_update(connection, grant_id)
            .await?
            .ok_or_else(not_found)
    }
}
