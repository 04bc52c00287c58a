use super::*;

use super::projection::recompute_pair;

impl PostgresGrantStore {
    pub(super) async fn list_unreconciled_expired_grants_impl(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                grants.id,
                grants.subject_user_id,
                grants.region,
                grants.access_level,
                grants.granted_by_user_id,
                grants.granted_at,
                grants.expires_at,
                grants.reason,
                grants.revoked_at,
                grants.revoked_by_user_id,
                grants.revoke_reason
            FROM region_access_grants AS grants
            WHERE grants.revoked_at IS NULL
              AND grants.expires_at <= $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM region_access_grant_expirations AS expirations
                  WHERE expirations.grant_id = grants.id
              )
            ORDER BY grants.expires_at, grants.id
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to list unreconciled expired grants: {error}"))
        })?;

        grants_from_rows(rows)
    }

    pub(super) async fn mark_grant_expired_impl(
        &self,
        grant_id: GrantId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let Some(pair) = self.find_grant_impl(grant_id).await? else {
            return Ok(false);
        };

        let mut transaction = self.begin().await?;
        lock_pair(&mut transaction, pair.subject_user_id(), pair.region()).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO region_access_grant_expirations (grant_id, reconciled_at)
            SELECT grants.id, $2
            FROM region_access_grants AS grants
            WHERE grants.id = $1
              AND grants.revoked_at IS NULL
              AND grants.expires_at <= $2
            ON CONFLICT (grant_id) DO NOTHING
            "#,
        )
        .bind(grant_id.as_uuid())
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to record expiration of grant '{grant_id}': {error}"
            ))
        })?
        .rows_affected()
            == 1;

        if !inserted {
            return Ok(false);
        }

        recompute_pair(&mut transaction, pair.subject_user_id(), pair.region(), now).await?;
        commit(transaction).await?;

        Ok(true)
    }
}
