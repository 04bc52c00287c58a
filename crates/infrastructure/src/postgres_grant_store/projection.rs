use super::*;

use tracing::debug;

/// Recomputes the projection row of one pair from the current truth.
///
/// Callers hold the pair lock. A permanent assignment wins; otherwise the
/// active grant with the latest expiry; with neither the row is deleted.
pub(super) async fn recompute_pair(
    connection: &mut PgConnection,
    user_id: UserId,
    region: &RegionId,
    now: DateTime<Utc>,
) -> AppResult<Option<AccessJustification>> {
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
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Storage(format!(
            "failed to check permanent assignment for user '{user_id}' in region '{region}': {error}"
        ))
    })?;

    let active_grant_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM region_access_grants
        WHERE subject_user_id = $1
          AND region = $2
          AND revoked_at IS NULL
          AND expires_at > $3
        ORDER BY expires_at DESC, id
        LIMIT 1
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(region.as_str())
    .bind(now)
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Storage(format!(
            "failed to find active grant for user '{user_id}' in region '{region}': {error}"
        ))
    })?;

    let justification = AccessJustification::resolve(
        has_permanent_assignment,
        active_grant_id.map(GrantId::from_uuid),
    );

    match justification {
        Some(justification) => {
            sqlx::query(
                r#"
                INSERT INTO region_effective_access (user_id, region, justification, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, region) DO UPDATE
                SET justification = EXCLUDED.justification,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(region.as_str())
            .bind(justification.as_storage_value())
            .bind(now)
            .execute(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to upsert effective access for user '{user_id}' in region '{region}': {error}"
                ))
            })?;
        }
        None => {
            sqlx::query(
                r#"
                DELETE FROM region_effective_access
                WHERE user_id = $1
                  AND region = $2
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(region.as_str())
            .execute(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to delete effective access for user '{user_id}' in region '{region}': {error}"
                ))
            })?;
        }
    }

    let tag = justification.map_or_else(|| "none".to_owned(), |value| value.as_storage_value());
    debug!(
        user_id = %user_id,
        region = %region,
        justification = %tag,
        "recomputed effective access"
    );

    Ok(justification)
}

impl PostgresGrantStore {
    pub(super) async fn find_effective_access_impl(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>> {
        let row = sqlx::query_as::<_, EffectiveAccessRow>(
            r#"
            SELECT user_id, region, justification
            FROM region_effective_access
            WHERE user_id = $1
              AND region = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to load effective access for user '{user_id}' in region '{region}': {error}"
            ))
        })?;

        row.map(EffectiveAccess::try_from).transpose()
    }

    pub(super) async fn list_effective_access_for_user_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>> {
        let rows = sqlx::query_as::<_, EffectiveAccessRow>(
            r#"
            SELECT user_id, region, justification
            FROM region_effective_access
            WHERE user_id = $1
            ORDER BY region
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to list effective access for user '{user_id}': {error}"
            ))
        })?;

        rows.into_iter().map(EffectiveAccess::try_from).collect()
    }

    pub(super) async fn rebuild_effective_access_impl(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut transaction = self.begin().await?;

        sqlx::query("LOCK TABLE region_effective_access IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to lock effective access table: {error}"))
            })?;

        sqlx::query("DELETE FROM region_effective_access")
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to clear effective access: {error}"))
            })?;

        let permanent_rows = sqlx::query(
            r#"
            INSERT INTO region_effective_access (user_id, region, justification, updated_at)
            SELECT user_id, region, 'permanent', $1
            FROM region_permanent_assignments
            "#,
        )
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to replay permanent assignments into effective access: {error}"
            ))
        })?
        .rows_affected();

        let temporary_rows = sqlx::query(
            r#"
            INSERT INTO region_effective_access (user_id, region, justification, updated_at)
            SELECT DISTINCT ON (grants.subject_user_id, grants.region)
                grants.subject_user_id,
                grants.region,
                'temporary:' || grants.id::TEXT,
                $1
            FROM region_access_grants AS grants
            WHERE grants.revoked_at IS NULL
              AND grants.expires_at > $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM region_permanent_assignments AS assignments
                  WHERE assignments.user_id = grants.subject_user_id
                    AND assignments.region = grants.region
              )
            ORDER BY grants.subject_user_id, grants.region, grants.expires_at DESC, grants.id
            "#,
        )
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to replay active grants into effective access: {error}"
            ))
        })?
        .rows_affected();

        commit(transaction).await?;

        Ok(permanent_rows + temporary_rows)
    }
}
