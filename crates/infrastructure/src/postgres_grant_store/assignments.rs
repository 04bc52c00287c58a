use super::*;

use super::projection::recompute_pair;

impl PostgresGrantStore {
    pub(super) async fn insert_permanent_assignment_impl(
        &self,
        assignment: &PermanentAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let user_id = assignment.user_id;
        let region = &assignment.region;
        let mut transaction = self.begin().await?;
        lock_pair(&mut transaction, user_id, region).await?;

        let has_active_grant = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM region_access_grants
                WHERE subject_user_id = $1
                  AND region = $2
                  AND revoked_at IS NULL
                  AND expires_at > $3
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .bind(now)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Storage(format!("failed to check active grants: {error}")))?;

        if has_active_grant {
            return Err(AppError::Conflict(format!(
                "user '{user_id}' already has an active temporary grant for region '{region}'"
            )));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO region_permanent_assignments (
                user_id,
                region,
                assigned_by_user_id,
                assigned_at
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, region) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .bind(assignment.assigned_by_user_id.as_uuid())
        .bind(assignment.assigned_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to insert permanent assignment: {error}"))
        })?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::Conflict(format!(
                "user '{user_id}' is already permanently assigned to region '{region}'"
            )));
        }

        recompute_pair(&mut transaction, user_id, region, now).await?;
        commit(transaction).await
    }

    pub(super) async fn delete_permanent_assignment_impl(
        &self,
        user_id: UserId,
        region: &RegionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut transaction = self.begin().await?;
        lock_pair(&mut transaction, user_id, region).await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM region_permanent_assignments
            WHERE user_id = $1
              AND region = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(region.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to delete permanent assignment: {error}"))
        })?
        .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }

        recompute_pair(&mut transaction, user_id, region, now).await?;
        commit(transaction).await?;

        Ok(true)
    }

    pub(super) async fn list_permanent_assignments_for_user_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>> {
        let rows = sqlx::query_as::<_, PermanentAssignmentRow>(
            r#"
            SELECT user_id, region, assigned_by_user_id, assigned_at
            FROM region_permanent_assignments
            WHERE user_id = $1
            ORDER BY region
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to list permanent assignments for user '{user_id}': {error}"
            ))
        })?;

        rows.into_iter().map(PermanentAssignment::try_from).collect()
    }
}
