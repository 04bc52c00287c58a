use super::*;

impl PostgresGrantStore {
    pub(super) async fn try_acquire_sweep_lease_impl(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        validate_sweep_lease_request(scope_key, holder_id, lease_seconds)?;
        let token = format!("{holder_id}:{}", Uuid::new_v4());

        let acquired = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO grant_sweep_leases (scope_key, holder_id, token, expires_at)
            VALUES ($1, $2, $3, now() + make_interval(secs => $4))
            ON CONFLICT (scope_key) DO UPDATE
            SET holder_id = EXCLUDED.holder_id,
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at
            WHERE grant_sweep_leases.expires_at <= now()
            RETURNING token
            "#,
        )
        .bind(scope_key)
        .bind(holder_id)
        .bind(token.as_str())
        .bind(f64::from(lease_seconds))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to acquire sweep lease '{scope_key}': {error}"
            ))
        })?;

        Ok(acquired.map(|token| SweepLease {
            scope_key: scope_key.to_owned(),
            holder_id: holder_id.to_owned(),
            token,
        }))
    }

    pub(super) async fn renew_sweep_lease_impl(
        &self,
        lease: &SweepLease,
        lease_seconds: u32,
    ) -> AppResult<bool> {
        validate_sweep_lease_request(
            lease.scope_key.as_str(),
            lease.holder_id.as_str(),
            lease_seconds,
        )?;

        let renewed = sqlx::query(
            r#"
            UPDATE grant_sweep_leases
            SET expires_at = now() + make_interval(secs => $3)
            WHERE scope_key = $1
              AND token = $2
              AND expires_at > now()
            "#,
        )
        .bind(lease.scope_key.as_str())
        .bind(lease.token.as_str())
        .bind(f64::from(lease_seconds))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to renew sweep lease '{}': {error}",
                lease.scope_key
            ))
        })?
        .rows_affected();

        Ok(renewed == 1)
    }

    pub(super) async fn release_sweep_lease_impl(&self, lease: &SweepLease) -> AppResult<()> {
        sqlx::query("DELETE FROM grant_sweep_leases WHERE scope_key = $1 AND token = $2")
            .bind(lease.scope_key.as_str())
            .bind(lease.token.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to release sweep lease '{}': {error}",
                    lease.scope_key
                ))
            })?;

        Ok(())
    }
}
